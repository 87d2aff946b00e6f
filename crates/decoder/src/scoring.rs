//! Candidate expansion and the three penalty terms.
//!
//! Probabilities arrive from the oracle, get floored and moved to log
//! space, then each active hypothesis branches into its top candidate
//! symbols. Completed candidates additionally receive a normalized score
//! combining the length, coverage, and overattending penalties.

use ordered_float::OrderedFloat;

use crate::config::DecodeConfig;
use crate::hypothesis::{Hypothesis, NORM_SENTINEL};
use crate::step::DecoderState;

/// Probability floor applied before any logarithm.
pub const PROB_FLOOR: f64 = 1e-30;

/// Scoring policy for one decode call. Copies the relevant config fields
/// so expansion does not chase a config reference per candidate.
#[derive(Debug, Clone)]
pub struct Scorer {
    beam_size: usize,
    min_length: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
    len_smooth: f64,
    stop_symbol: u32,
}

impl Scorer {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            beam_size: config.beam_size,
            min_length: config.min_length,
            alpha: config.alpha,
            beta: config.beta,
            gamma: config.gamma,
            len_smooth: config.len_smooth,
            stop_symbol: config.stop_symbol,
        }
    }

    /// Convert one probability row to log space.
    ///
    /// Every probability is floored at [`PROB_FLOOR`] first. While the
    /// step index is below `min_length`, the stop symbol's probability is
    /// forced down to the floor so no hypothesis can complete early.
    pub fn log_distribution(&self, step: usize, dist: &[f64]) -> Vec<f64> {
        dist.iter()
            .enumerate()
            .map(|(sym, &p)| {
                let p = if step < self.min_length && sym as u32 == self.stop_symbol {
                    PROB_FLOOR
                } else {
                    p.max(PROB_FLOOR)
                };
                p.ln()
            })
            .collect()
    }

    /// Pre-prune a log-distribution to the `beam_size + 1` most probable
    /// symbols. The extra slot exists because the stop symbol's true rank
    /// is only known once its normalized score is computed.
    ///
    /// Ties break toward the lower symbol id so runs are reproducible.
    pub fn preprune(&self, log_dist: &[f64]) -> Vec<u32> {
        let mut symbols: Vec<u32> = (0..log_dist.len() as u32).collect();
        symbols.sort_unstable_by(|&a, &b| {
            OrderedFloat(log_dist[b as usize])
                .cmp(&OrderedFloat(log_dist[a as usize]))
                .then(a.cmp(&b))
        });
        symbols.truncate(self.beam_size + 1);
        symbols
    }

    /// Branch one active hypothesis into scored candidate continuations.
    ///
    /// The previously emitted symbol moves into the history (except at
    /// step 0, where it is the start symbol and is dropped); each
    /// surviving candidate symbol becomes the new `last_sym`. Attention
    /// is accumulated into coverage once per step, before candidate
    /// selection, since it depends on the decoder state rather than on
    /// which symbol gets picked.
    pub fn expand(
        &self,
        hyp: &Hypothesis,
        step: usize,
        log_dist: &[f64],
        attention_row: &[f64],
        new_state: &DecoderState,
        mask_row: &[f64],
    ) -> Vec<Hypothesis> {
        let mut history = hyp.history.clone();
        if step > 0 {
            history.push(hyp.last_sym);
        }
        let coverage: Vec<f64> = hyp
            .coverage
            .iter()
            .zip(attention_row)
            .map(|(c, a)| c + a)
            .collect();

        self.preprune(log_dist)
            .into_iter()
            .map(|symbol| {
                let score = hyp.score + log_dist[symbol as usize];
                let norm_score = if symbol == self.stop_symbol {
                    self.normalized_score(score, history.len(), &coverage, mask_row)
                } else {
                    NORM_SENTINEL
                };
                Hypothesis {
                    sentence: hyp.sentence,
                    score,
                    norm_score,
                    history: history.clone(),
                    last_sym: symbol,
                    state: new_state.clone(),
                    coverage: coverage.clone(),
                }
            })
            .collect()
    }

    /// Penalty-adjusted score for a completed hypothesis:
    /// `score / lp + cp + oap`.
    fn normalized_score(
        &self,
        score: f64,
        emitted_len: usize,
        coverage: &[f64],
        mask_row: &[f64],
    ) -> f64 {
        score / self.length_penalty(emitted_len)
            + self.coverage_penalty(coverage, mask_row)
            + self.overattending_penalty(coverage)
    }

    /// Length-penalty divisor. Non-decreasing in `emitted_len` for
    /// positive `alpha`; 1 when the penalty is disabled.
    pub fn length_penalty(&self, emitted_len: usize) -> f64 {
        if self.alpha > 0.0 {
            (self.len_smooth + emitted_len as f64).powf(self.alpha)
                / (self.len_smooth + 1.0).powf(self.alpha)
        } else {
            1.0
        }
    }

    /// Coverage penalty over valid source positions. Masked positions get
    /// 1 added so they contribute `ln(1) = 0`. Always <= 0.
    pub fn coverage_penalty(&self, coverage: &[f64], mask_row: &[f64]) -> f64 {
        if self.beta > 0.0 {
            self.beta
                * coverage
                    .iter()
                    .zip(mask_row)
                    .map(|(c, m)| (c + (1.0 - m)).min(1.0).ln())
                    .sum::<f64>()
        } else {
            0.0
        }
    }

    /// Penalty for any source position attended with total mass beyond 1.
    /// Computed from the raw coverage; the mask adjustment above does not
    /// apply here.
    pub fn overattending_penalty(&self, coverage: &[f64]) -> f64 {
        if self.gamma > 0.0 {
            let peak = coverage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            self.gamma * -(peak - 1.0).max(0.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::COVERAGE_FLOOR;

    fn scorer(cfg: &DecodeConfig) -> Scorer {
        Scorer::new(cfg)
    }

    fn plain_config() -> DecodeConfig {
        DecodeConfig {
            beam_size: 2,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            min_length: 0,
            ..Default::default()
        }
    }

    fn start_hyp(source_len: usize) -> Hypothesis {
        Hypothesis {
            sentence: 0,
            score: 0.0,
            norm_score: NORM_SENTINEL,
            history: vec![],
            last_sym: 1,
            state: DecoderState::single(vec![0.0]),
            coverage: vec![COVERAGE_FLOOR; source_len],
        }
    }

    #[test]
    fn test_log_distribution_floors_zero_probability() {
        let s = scorer(&plain_config());
        let logs = s.log_distribution(0, &[0.0, 1.0]);
        assert!((logs[0] - PROB_FLOOR.ln()).abs() < 1e-9);
        assert!(logs[1].abs() < 1e-12);
    }

    #[test]
    fn test_min_length_floors_stop_below_threshold() {
        let cfg = DecodeConfig {
            min_length: 2,
            ..plain_config()
        };
        let s = scorer(&cfg);
        let dist = [0.5, 0.5];

        // Steps 0 and 1: stop (symbol 0) is floored.
        for step in 0..2 {
            let logs = s.log_distribution(step, &dist);
            assert!((logs[0] - PROB_FLOOR.ln()).abs() < 1e-9);
            assert!((logs[1] - 0.5f64.ln()).abs() < 1e-9);
        }
        // Step 2: stop keeps its real probability.
        let logs = s.log_distribution(2, &dist);
        assert!((logs[0] - 0.5f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_preprune_keeps_beam_size_plus_one() {
        let s = scorer(&plain_config()); // beam_size = 2
        let logs: Vec<f64> = [0.1f64, 0.4, 0.05, 0.3, 0.15]
            .iter()
            .map(|p| p.ln())
            .collect();
        let kept = s.preprune(&logs);
        assert_eq!(kept, vec![1, 3, 4]);
    }

    #[test]
    fn test_preprune_tie_breaks_on_symbol_id() {
        let s = scorer(&plain_config());
        let logs: Vec<f64> = [0.25f64, 0.25, 0.25, 0.25].iter().map(|p| p.ln()).collect();
        assert_eq!(s.preprune(&logs), vec![0, 1, 2]);
    }

    #[test]
    fn test_expand_first_step_drops_start_symbol() {
        // The spec scenario: P(stop)=0.1, P(a)=0.6, P(b)=0.3 with all
        // penalties off. The stop candidate created at step 0 carries an
        // empty history and score = norm_score = ln(0.1).
        let s = scorer(&plain_config());
        let hyp = start_hyp(2);
        let logs = s.log_distribution(0, &[0.1, 0.6, 0.3]);
        let out = s.expand(&hyp, 0, &logs, &[0.5, 0.5], &hyp.state, &[1.0, 1.0]);

        assert_eq!(out.len(), 3); // beam_size + 1
        let stop = out.iter().find(|h| h.last_sym == 0).unwrap();
        assert!(stop.history.is_empty());
        assert!((stop.score - 0.1f64.ln()).abs() < 1e-9);
        assert!((stop.norm_score - 0.1f64.ln()).abs() < 1e-9);

        let a = out.iter().find(|h| h.last_sym == 1).unwrap();
        assert!((a.score - 0.6f64.ln()).abs() < 1e-9);
        assert_eq!(a.norm_score, NORM_SENTINEL);
    }

    #[test]
    fn test_expand_appends_previous_symbol_after_first_step() {
        let s = scorer(&plain_config());
        let mut hyp = start_hyp(2);
        hyp.history = vec![2];
        hyp.last_sym = 1;
        hyp.score = -1.0;
        let logs = s.log_distribution(3, &[0.1, 0.6, 0.3]);
        let out = s.expand(&hyp, 3, &logs, &[0.0, 0.0], &hyp.state, &[1.0, 1.0]);

        for h in &out {
            assert_eq!(h.history, vec![2, 1]);
        }
    }

    #[test]
    fn test_expand_accumulates_attention_for_every_candidate() {
        let s = scorer(&plain_config());
        let mut hyp = start_hyp(2);
        hyp.coverage = vec![0.2, 0.3];
        let logs = s.log_distribution(1, &[0.1, 0.6, 0.3]);
        let out = s.expand(&hyp, 1, &logs, &[0.1, 0.4], &hyp.state, &[1.0, 1.0]);

        for h in &out {
            assert!((h.coverage[0] - 0.3).abs() < 1e-12);
            assert!((h.coverage[1] - 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn test_length_penalty_monotone_in_length() {
        let cfg = DecodeConfig {
            alpha: 0.8,
            len_smooth: 5.0,
            ..plain_config()
        };
        let s = scorer(&cfg);
        let mut prev = 0.0;
        for len in 0..20 {
            let lp = s.length_penalty(len);
            assert!(lp >= prev, "lp must be non-decreasing in length");
            prev = lp;
        }
        // A one-symbol completion is the neutral point.
        assert!((s.length_penalty(1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_penalty_disabled_by_zero_alpha() {
        let s = scorer(&plain_config());
        assert_eq!(s.length_penalty(17), 1.0);
    }

    #[test]
    fn test_coverage_penalty_never_positive() {
        let cfg = DecodeConfig {
            beta: 0.4,
            ..plain_config()
        };
        let s = scorer(&cfg);
        for coverage in [
            vec![0.0, 0.0],
            vec![0.5, 0.2],
            vec![1.0, 1.0],
            vec![2.0, 3.0],
        ] {
            let cp = s.coverage_penalty(&coverage, &[1.0, 1.0]);
            assert!(cp <= 0.0, "cp = {cp} for {coverage:?}");
        }
        // Fully covered source incurs no penalty.
        assert_eq!(s.coverage_penalty(&[1.0, 1.5], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_coverage_penalty_ignores_masked_positions() {
        let cfg = DecodeConfig {
            beta: 1.0,
            ..plain_config()
        };
        let s = scorer(&cfg);
        // Position 1 is padding: mask 0 lifts it to >= 1 before the log.
        let cp = s.coverage_penalty(&[0.5, 0.0], &[1.0, 0.0]);
        assert!((cp - 0.5f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_overattending_penalty() {
        let cfg = DecodeConfig {
            gamma: 2.0,
            ..plain_config()
        };
        let s = scorer(&cfg);
        assert_eq!(s.overattending_penalty(&[0.4, 0.9]), 0.0);
        let oap = s.overattending_penalty(&[0.4, 1.5]);
        assert!((oap - (-1.0)).abs() < 1e-9); // 2.0 * -(1.5 - 1.0)
    }

    #[test]
    fn test_penalties_compose_into_norm_score() {
        let cfg = DecodeConfig {
            beam_size: 3,
            alpha: 0.5,
            beta: 0.4,
            gamma: 1.0,
            len_smooth: 5.0,
            ..Default::default()
        };
        let s = scorer(&cfg);
        let mut hyp = start_hyp(2);
        hyp.history = vec![4];
        hyp.last_sym = 5;
        hyp.score = -2.0;
        hyp.coverage = vec![0.4, 1.1];

        let logs = s.log_distribution(2, &[0.2, 0.2, 0.2, 0.2, 0.1, 0.1]);
        let out = s.expand(&hyp, 2, &logs, &[0.1, 0.1], &hyp.state, &[1.0, 1.0]);
        let stop = out.iter().find(|h| h.last_sym == 0).unwrap();

        // history' = [4, 5] after the previous symbol moves in.
        let score = -2.0 + 0.2f64.ln();
        let lp = (5.0 + 2.0f64).powf(0.5) / 6.0f64.powf(0.5);
        let cp = 0.4 * (0.5f64.min(1.0).ln() + 1.2f64.min(1.0).ln());
        let oap = -(1.2 - 1.0);
        assert!((stop.norm_score - (score / lp + cp + oap)).abs() < 1e-9);
    }
}
