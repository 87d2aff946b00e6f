//! Data types for decoded hypotheses, per-sentence results, and decode statistics.

use serde::{Deserialize, Serialize};

/// One candidate output sequence for a sentence, ready for detokenization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedHypothesis {
    /// Emitted symbols in order, including the final symbol (the stop
    /// symbol when the hypothesis completed). The start symbol is never
    /// included.
    pub symbols: Vec<u32>,
    /// Cumulative sum of per-step log-probabilities.
    pub score: f64,
    /// Length- and coverage-adjusted score. Only meaningful for completed
    /// hypotheses; a very negative sentinel otherwise.
    pub norm_score: f64,
    /// Accumulated attention mass per source position (diagnostic).
    pub coverage: Vec<f64>,
}

impl DecodedHypothesis {
    /// Number of emitted symbols, including the final one.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if no symbol was emitted at all.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Ranked hypotheses for one input sentence.
///
/// Hypotheses are ordered by descending `(norm_score, score)`, so the
/// first entry is the one downstream detokenization consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceDecode {
    /// Index of the sentence in the decoded batch.
    pub sentence: usize,
    /// Surviving hypotheses, best first.
    pub hypotheses: Vec<DecodedHypothesis>,
}

impl SentenceDecode {
    /// The top-ranked hypothesis, if any survived.
    pub fn best(&self) -> Option<&DecodedHypothesis> {
        self.hypotheses.first()
    }
}

/// Result of decoding one batch of sentences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOutcome {
    /// Per-sentence results, ordered by sentence index.
    pub sentences: Vec<SentenceDecode>,
    /// Number of steps the decode loop executed.
    pub steps: usize,
    /// Counters collected while decoding.
    pub stats: DecodeStats,
}

impl DecodeOutcome {
    /// Look up the result for a sentence by its batch index.
    pub fn sentence(&self, sentence: usize) -> Option<&SentenceDecode> {
        self.sentences.iter().find(|s| s.sentence == sentence)
    }
}

/// Detailed statistics from a single batch decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Number of steps the loop executed (mirrors `DecodeOutcome::steps`).
    pub steps_executed: u32,
    /// Number of oracle invocations (one per executed step).
    pub oracle_calls: u32,
    /// Cumulative wall time in ms spent inside the oracle.
    pub total_oracle_time_ms: u64,
    /// Candidate hypotheses created by expansion across all steps.
    pub candidates_generated: u32,
    /// Hypotheses dropped by the keep-filter and width truncation.
    pub candidates_pruned: u32,
    /// Completed hypotheses created across all steps (pre-pruning).
    pub completions_created: u32,
    /// Largest number of simultaneously active hypotheses in any step.
    pub peak_active: usize,
}
