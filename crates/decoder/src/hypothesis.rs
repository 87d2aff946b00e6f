//! The hypothesis record and by-sentence grouping.

use ordered_float::OrderedFloat;

use crate::step::DecoderState;

/// Placeholder normalized score for hypotheses that have not completed.
/// Ranks below every real score and is never used to rank active
/// hypotheses against each other.
pub const NORM_SENTINEL: f64 = -1e30;

/// Initial per-position coverage. Kept slightly above zero so the
/// coverage penalty's logarithm stays defined for never-attended positions.
pub const COVERAGE_FLOOR: f64 = 1e-30;

/// One partial or complete candidate output sequence.
///
/// Records are immutable: expansion builds new records rather than
/// mutating, so sibling hypotheses branched from the same parent share
/// nothing mutable.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    /// Index of the input sentence this hypothesis belongs to.
    pub sentence: usize,
    /// Cumulative sum of per-step log-probabilities.
    pub score: f64,
    /// Penalty-adjusted score; [`NORM_SENTINEL`] until completion.
    pub norm_score: f64,
    /// Symbols emitted before `last_sym`, oldest first. The start symbol
    /// is never recorded, so a hypothesis created at step `s` has exactly
    /// `s` entries here.
    pub history: Vec<u32>,
    /// Most recently emitted symbol.
    pub last_sym: u32,
    /// Decoder state needed to score the next step.
    pub state: DecoderState,
    /// Accumulated attention mass per source position.
    pub coverage: Vec<f64>,
}

impl Hypothesis {
    /// True once the hypothesis has emitted the stop symbol. Completed
    /// hypotheses are never re-expanded.
    pub fn is_completed(&self, stop_symbol: u32) -> bool {
        self.last_sym == stop_symbol
    }

    /// Full emitted sequence: `history` followed by `last_sym`.
    pub fn symbols(&self) -> Vec<u32> {
        let mut out = self.history.clone();
        out.push(self.last_sym);
        out
    }
}

/// Build the initial beam: one hypothesis per sentence, zero score,
/// empty history, coverage seeded at the floor across the sentence's
/// source positions.
pub fn initial_beam(
    initial_states: Vec<DecoderState>,
    source_mask: &[Vec<f64>],
    start_symbol: u32,
) -> Vec<Hypothesis> {
    initial_states
        .into_iter()
        .zip(source_mask)
        .enumerate()
        .map(|(sentence, (state, mask_row))| Hypothesis {
            sentence,
            score: 0.0,
            norm_score: NORM_SENTINEL,
            history: Vec::new(),
            last_sym: start_symbol,
            state,
            coverage: vec![COVERAGE_FLOOR; mask_row.len()],
        })
        .collect()
}

/// Group hypotheses by sentence, each group ordered by descending
/// `(norm_score, score)`.
///
/// The sort key `(sentence, -norm_score, -score)` also fixes the output
/// ranking under equal scores, so callers must not reorder the groups.
pub fn by_sentence(mut hyps: Vec<Hypothesis>) -> Vec<(usize, Vec<Hypothesis>)> {
    hyps.sort_by(|a, b| {
        a.sentence
            .cmp(&b.sentence)
            .then_with(|| OrderedFloat(b.norm_score).cmp(&OrderedFloat(a.norm_score)))
            .then_with(|| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)))
    });

    let mut groups: Vec<(usize, Vec<Hypothesis>)> = Vec::new();
    for hyp in hyps {
        match groups.last_mut() {
            Some((sentence, group)) if *sentence == hyp.sentence => group.push(hyp),
            _ => groups.push((hyp.sentence, vec![hyp])),
        }
    }
    groups
}
