//! Batched oracle exchange types and contract validation.
//!
//! One `StepRequest`/`StepResponse` pair crosses the oracle boundary per
//! timestep. The response is validated before any of it reaches scoring:
//! a model backend that returns garbage must fail the decode, not skew it.

use crate::engine::DecodeError;

/// Tolerated deviation of a probability row's sum from 1.0.
pub const DIST_SUM_TOLERANCE: f64 = 1e-3;

/// Recurrent decoder state snapshot for a single hypothesis.
///
/// One vector per recurrent layer. Each hypothesis owns its snapshot
/// exclusively; branching clones it, so a later step can never mutate
/// state shared with a sibling hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderState {
    /// Per-layer state vectors.
    pub layers: Vec<Vec<f32>>,
}

impl DecoderState {
    /// Build a single-layer state from raw values.
    pub fn single(values: Vec<f32>) -> Self {
        Self {
            layers: vec![values],
        }
    }
}

/// Inputs for one oracle step over the currently active hypotheses.
///
/// All vectors are indexed by active-hypothesis position and have equal
/// length. `mask` is all ones here (every batched hypothesis is live);
/// the field exists because the oracle contract requires a validity mask.
#[derive(Debug, Clone)]
pub struct StepRequest {
    /// 0-based step index.
    pub step: usize,
    /// Decoder state of each active hypothesis.
    pub states: Vec<DecoderState>,
    /// Last symbol emitted by each active hypothesis.
    pub prev_symbols: Vec<u32>,
    /// Validity mask over the batch.
    pub mask: Vec<f32>,
    /// Sentence index of each active hypothesis.
    pub sentences: Vec<usize>,
}

/// Outputs of one oracle step.
#[derive(Debug, Clone)]
pub struct StepResponse {
    /// Updated decoder state per hypothesis.
    pub states: Vec<DecoderState>,
    /// Next-symbol probability distribution per hypothesis. Rows are
    /// non-negative and sum to 1.
    pub distributions: Vec<Vec<f64>>,
    /// Attention weights over source positions per hypothesis. Row `j`
    /// has the source length of the hypothesis's sentence.
    pub attention: Vec<Vec<f64>>,
}

impl StepResponse {
    /// Check this response against the request it answers.
    ///
    /// Enforces the oracle contract: one row of each kind per active
    /// hypothesis, a uniform vocabulary width, finite non-negative
    /// probabilities summing to ~1, and finite non-negative attention
    /// sized to each hypothesis's source sentence. Violations surface as
    /// [`DecodeError::Contract`]; nothing is sanitized.
    pub fn validate(
        &self,
        request: &StepRequest,
        source_mask: &[Vec<f64>],
    ) -> Result<(), DecodeError> {
        let n = request.states.len();
        if self.states.len() != n {
            return Err(contract(format!(
                "expected {n} updated states, got {}",
                self.states.len()
            )));
        }
        if self.distributions.len() != n {
            return Err(contract(format!(
                "expected {n} distribution rows, got {}",
                self.distributions.len()
            )));
        }
        if self.attention.len() != n {
            return Err(contract(format!(
                "expected {n} attention rows, got {}",
                self.attention.len()
            )));
        }

        let n_symbols = self.distributions.first().map_or(0, Vec::len);
        if n_symbols == 0 {
            return Err(contract("empty symbol distribution".to_string()));
        }
        for (j, row) in self.distributions.iter().enumerate() {
            if row.len() != n_symbols {
                return Err(contract(format!(
                    "distribution row {j} has {} symbols, expected {n_symbols}",
                    row.len()
                )));
            }
            let mut sum = 0.0;
            for &p in row {
                if !p.is_finite() || p < 0.0 {
                    return Err(contract(format!(
                        "distribution row {j} contains invalid probability {p}"
                    )));
                }
                sum += p;
            }
            if (sum - 1.0).abs() > DIST_SUM_TOLERANCE {
                return Err(contract(format!("distribution row {j} sums to {sum}")));
            }
        }

        for (j, row) in self.attention.iter().enumerate() {
            let source_len = source_mask[request.sentences[j]].len();
            if row.len() != source_len {
                return Err(contract(format!(
                    "attention row {j} has {} positions, expected {source_len}",
                    row.len()
                )));
            }
            for &a in row {
                if !a.is_finite() || a < 0.0 {
                    return Err(contract(format!(
                        "attention row {j} contains invalid weight {a}"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn contract(message: String) -> DecodeError {
    DecodeError::Contract(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize, sentences: Vec<usize>) -> StepRequest {
        StepRequest {
            step: 0,
            states: vec![DecoderState::single(vec![0.0]); n],
            prev_symbols: vec![1; n],
            mask: vec![1.0; n],
            sentences,
        }
    }

    fn response(n: usize, dist: Vec<f64>, attention: Vec<f64>) -> StepResponse {
        StepResponse {
            states: vec![DecoderState::single(vec![0.0]); n],
            distributions: vec![dist; n],
            attention: vec![attention; n],
        }
    }

    #[test]
    fn test_valid_response_passes() {
        let req = request(2, vec![0, 0]);
        let resp = response(2, vec![0.1, 0.6, 0.3], vec![0.5, 0.5]);
        let mask = vec![vec![1.0, 1.0]];
        assert!(resp.validate(&req, &mask).is_ok());
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let req = request(2, vec![0, 0]);
        let mut resp = response(2, vec![0.5, 0.5], vec![1.0]);
        resp.distributions.pop();
        let mask = vec![vec![1.0]];
        let err = resp.validate(&req, &mask).unwrap_err();
        assert!(err.to_string().contains("distribution rows"));
    }

    #[test]
    fn test_negative_probability_rejected() {
        let req = request(1, vec![0]);
        let resp = response(1, vec![1.2, -0.2], vec![1.0]);
        let mask = vec![vec![1.0]];
        assert!(resp.validate(&req, &mask).is_err());
    }

    #[test]
    fn test_non_finite_probability_rejected() {
        let req = request(1, vec![0]);
        let resp = response(1, vec![f64::NAN, 1.0], vec![1.0]);
        let mask = vec![vec![1.0]];
        assert!(resp.validate(&req, &mask).is_err());
    }

    #[test]
    fn test_bad_row_sum_rejected() {
        let req = request(1, vec![0]);
        let resp = response(1, vec![0.3, 0.3], vec![1.0]);
        let mask = vec![vec![1.0]];
        let err = resp.validate(&req, &mask).unwrap_err();
        assert!(err.to_string().contains("sums to"));
    }

    #[test]
    fn test_row_sum_within_tolerance_passes() {
        let req = request(1, vec![0]);
        let resp = response(1, vec![0.5, 0.5004], vec![1.0]);
        let mask = vec![vec![1.0]];
        assert!(resp.validate(&req, &mask).is_ok());
    }

    #[test]
    fn test_attention_width_checked_per_sentence() {
        // Sentence 1 has 3 source positions; a 2-wide row must fail.
        let req = request(1, vec![1]);
        let resp = response(1, vec![0.5, 0.5], vec![0.5, 0.5]);
        let mask = vec![vec![1.0], vec![1.0, 1.0, 1.0]];
        let err = resp.validate(&req, &mask).unwrap_err();
        assert!(err.to_string().contains("attention row"));
    }

    #[test]
    fn test_negative_attention_rejected() {
        let req = request(1, vec![0]);
        let resp = response(1, vec![0.5, 0.5], vec![1.5, -0.5]);
        let mask = vec![vec![1.0, 1.0]];
        assert!(resp.validate(&req, &mask).is_err());
    }

    #[test]
    fn test_ragged_vocabulary_rejected() {
        let req = request(2, vec![0, 0]);
        let mut resp = response(2, vec![0.5, 0.5], vec![1.0]);
        resp.distributions[1] = vec![0.2, 0.3, 0.5];
        let mask = vec![vec![1.0]];
        assert!(resp.validate(&req, &mask).is_err());
    }
}
