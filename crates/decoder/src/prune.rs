//! Per-sentence beam pruning.
//!
//! Two regimes share one filter: completed hypotheses survive only within
//! an epsilon of the best completed normalized score, while active
//! hypotheses are thinned with the `speed_prune` margin. The active rule
//! deliberately compares a raw cumulative log-score against a scaled
//! *normalized* threshold. The scales do not match; the original
//! heuristic was tuned that way and correcting it changes search quality,
//! so it is preserved as-is. After filtering, every group is sorted by
//! raw score and truncated to the beam width, whether or not the
//! keep-filter ran.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::config::DecodeConfig;
use crate::hypothesis::Hypothesis;

/// Completed hypotheses must come within this margin of the best
/// completed normalized score to survive.
pub const KEEP_EPSILON: f64 = 1e-6;

/// Pruning policy for one decode call.
#[derive(Debug, Clone)]
pub struct Pruner {
    beam_size: usize,
    speed_prune: f64,
    prune: bool,
    stop_symbol: u32,
}

impl Pruner {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            beam_size: config.beam_size,
            speed_prune: config.speed_prune,
            prune: config.prune,
            stop_symbol: config.stop_symbol,
        }
    }

    /// Filter and truncate one sentence's hypotheses.
    ///
    /// The caller hands in a group pre-sorted by `(norm_score, score)`
    /// descending (the `by_sentence` order); the stable raw-score sort
    /// below preserves that order among ties, keeping runs reproducible.
    /// A non-empty input group always yields a non-empty output group:
    /// the best completed hypothesis passes its own threshold, and
    /// without any completed hypothesis the filter keeps every active
    /// one.
    pub fn prune_group(&self, mut group: Vec<Hypothesis>) -> Vec<Hypothesis> {
        let best_normalized = self.best_completed_norm(&group);
        group.retain(|hyp| self.keep(hyp, best_normalized));
        group.sort_by_key(|hyp| Reverse(OrderedFloat(hyp.score)));
        group.truncate(self.beam_size);
        group
    }

    /// Best normalized score among completed hypotheses, `None` when the
    /// group has none yet. Active hypotheses only carry the sentinel, so
    /// this matches taking the maximum over the whole group.
    fn best_completed_norm(&self, group: &[Hypothesis]) -> Option<f64> {
        group
            .iter()
            .filter(|hyp| hyp.is_completed(self.stop_symbol))
            .map(|hyp| OrderedFloat(hyp.norm_score))
            .max()
            .map(|best| best.into_inner())
    }

    fn keep(&self, hyp: &Hypothesis, best_normalized: Option<f64>) -> bool {
        if !self.prune {
            return true;
        }
        // No completed hypothesis yet: the thresholds are meaningless, and
        // applying them could empty the beam for an active sentence. Keep
        // everything.
        let Some(best) = best_normalized else {
            return true;
        };
        if hyp.is_completed(self.stop_symbol) {
            hyp.norm_score > best - KEEP_EPSILON
        } else {
            hyp.score > best * self.speed_prune
        }
    }
}
