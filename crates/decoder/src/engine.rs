//! The beam-search loop, its oracle trait, and the error taxonomy.

use std::time::Instant;

use async_trait::async_trait;

use transcript::{DecodeOutcome, DecodeStats, DecodedHypothesis, SentenceDecode};

use crate::config::DecodeConfig;
use crate::hypothesis::{by_sentence, initial_beam, Hypothesis};
use crate::prune::Pruner;
use crate::scoring::Scorer;
use crate::step::{DecoderState, StepRequest, StepResponse};

/// Errors that can occur during a batch decode.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Error from the scoring oracle (model backend).
    #[error("oracle error: {0}")]
    Oracle(#[source] anyhow::Error),
    /// The oracle returned output violating its contract.
    #[error("oracle contract violation: {0}")]
    Contract(String),
    /// Caller-supplied inputs are inconsistent.
    #[error("invalid decode input: {0}")]
    Input(String),
}

/// Per-step scoring function of the sequence model.
///
/// Given the batched state of all active hypotheses, produce their
/// updated states, next-symbol distributions, and attention rows. The
/// loop treats this as opaque and deterministic-given-inputs; the call
/// is the loop's only suspension point, and the backend may batch or
/// parallelize internally however it likes.
#[async_trait]
pub trait StepOracle: Send + Sync {
    async fn step(&self, request: &StepRequest) -> Result<StepResponse, DecodeError>;
}

/// Coverage-penalized beam-search decoder.
///
/// Runs the timestep loop: partition hypotheses into active and
/// completed, score the active batch through the oracle, expand, prune
/// per sentence, repeat until no hypothesis is active or the step budget
/// runs out.
#[derive(Debug, Clone)]
pub struct BeamDecoder {
    config: DecodeConfig,
}

impl BeamDecoder {
    /// Create a decoder with the given configuration.
    pub fn new(config: DecodeConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decode one batch of sentences.
    ///
    /// `initial_states` holds one decoder state per sentence;
    /// `source_mask` one row per sentence marking valid (non-padding)
    /// source positions, its row length defining that sentence's source
    /// width. Returns the surviving hypotheses grouped by sentence,
    /// ranked by descending `(norm_score, score)`, along with the number
    /// of steps executed.
    pub async fn decode(
        &self,
        oracle: &dyn StepOracle,
        initial_states: Vec<DecoderState>,
        source_mask: &[Vec<f64>],
    ) -> Result<DecodeOutcome, DecodeError> {
        if initial_states.len() != source_mask.len() {
            return Err(DecodeError::Input(format!(
                "{} initial states for {} source mask rows",
                initial_states.len(),
                source_mask.len()
            )));
        }

        let scorer = Scorer::new(&self.config);
        let pruner = Pruner::new(&self.config);
        let stop = self.config.stop_symbol;
        let mut stats = DecodeStats::default();

        let mut beams = initial_beam(initial_states, source_mask, self.config.start_symbol);

        // The final step of the budget is reserved: a sequence needs both
        // its start symbol and a stop symbol inside `max_length` slots.
        let budget = self.config.max_length.saturating_sub(2);

        for step in 0..budget {
            let (completed, active): (Vec<Hypothesis>, Vec<Hypothesis>) =
                beams.into_iter().partition(|hyp| hyp.is_completed(stop));

            if active.is_empty() {
                return Ok(self.finish(completed, step, stats));
            }
            stats.peak_active = stats.peak_active.max(active.len());

            let request = StepRequest {
                step,
                states: active.iter().map(|hyp| hyp.state.clone()).collect(),
                prev_symbols: active.iter().map(|hyp| hyp.last_sym).collect(),
                mask: vec![1.0; active.len()],
                sentences: active.iter().map(|hyp| hyp.sentence).collect(),
            };

            let oracle_start = Instant::now();
            let response = oracle.step(&request).await?;
            stats.oracle_calls += 1;
            stats.total_oracle_time_ms += oracle_start.elapsed().as_millis() as u64;

            response.validate(&request, source_mask)?;
            let n_symbols = response.distributions[0].len();
            if stop as usize >= n_symbols {
                return Err(DecodeError::Contract(format!(
                    "stop symbol {stop} outside vocabulary of {n_symbols} symbols"
                )));
            }

            let mut next = completed;
            for (j, hyp) in active.iter().enumerate() {
                let log_dist = scorer.log_distribution(step, &response.distributions[j]);
                let expanded = scorer.expand(
                    hyp,
                    step,
                    &log_dist,
                    &response.attention[j],
                    &response.states[j],
                    &source_mask[hyp.sentence],
                );
                stats.candidates_generated += expanded.len() as u32;
                stats.completions_created +=
                    expanded.iter().filter(|h| h.is_completed(stop)).count() as u32;
                next.extend(expanded);
            }

            let before = next.len();
            let mut pruned = Vec::new();
            for (_, group) in by_sentence(next) {
                pruned.extend(pruner.prune_group(group));
            }
            stats.candidates_pruned += (before - pruned.len()) as u32;

            tracing::debug!(
                step,
                active = active.len(),
                beam = pruned.len(),
                "beam step complete"
            );
            beams = pruned;
        }

        // Budget exhausted with hypotheses still active. The reported
        // step count is max_length - 1, one past the executed iteration
        // count; downstream consumers rely on this accounting.
        Ok(self.finish(beams, self.config.max_length.saturating_sub(1), stats))
    }

    fn finish(&self, beams: Vec<Hypothesis>, steps: usize, mut stats: DecodeStats) -> DecodeOutcome {
        stats.steps_executed = steps as u32;
        let sentences: Vec<SentenceDecode> = by_sentence(beams)
            .into_iter()
            .map(|(sentence, group)| SentenceDecode {
                sentence,
                hypotheses: group
                    .into_iter()
                    .map(|hyp| DecodedHypothesis {
                        symbols: hyp.symbols(),
                        score: hyp.score,
                        norm_score: hyp.norm_score,
                        coverage: hyp.coverage,
                    })
                    .collect(),
            })
            .collect();

        tracing::info!(steps, sentences = sentences.len(), "decode finished");
        DecodeOutcome {
            sentences,
            steps,
            stats,
        }
    }
}
