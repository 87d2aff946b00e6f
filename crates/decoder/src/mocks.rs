//! Canned `StepOracle` implementations for testing without a model.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::engine::{DecodeError, StepOracle};
use crate::step::{StepRequest, StepResponse};

/// Mock oracle returning canned distributions and attention rows.
///
/// Every active hypothesis receives the same distribution at a given
/// step: the default one, or a per-step override when present. Attention
/// rows are fixed per sentence. Decoder states pass through unchanged,
/// which keeps the oracle deterministic-given-inputs as the contract
/// requires.
pub struct MockOracle {
    default_dist: Vec<f64>,
    step_dists: HashMap<usize, Vec<f64>>,
    attention: Vec<Vec<f64>>,
}

impl MockOracle {
    /// Create a mock with one distribution for every step and one
    /// attention row per sentence (indexed by sentence id).
    pub fn fixed(default_dist: Vec<f64>, attention: Vec<Vec<f64>>) -> Self {
        Self {
            default_dist,
            step_dists: HashMap::new(),
            attention,
        }
    }

    /// Override the distribution returned at one specific step.
    pub fn add_step_dist(&mut self, step: usize, dist: Vec<f64>) {
        self.step_dists.insert(step, dist);
    }

    /// Uniform attention rows for the given per-sentence source lengths.
    pub fn uniform_attention(source_lens: &[usize]) -> Vec<Vec<f64>> {
        source_lens
            .iter()
            .map(|&len| vec![1.0 / len.max(1) as f64; len])
            .collect()
    }
}

#[async_trait]
impl StepOracle for MockOracle {
    async fn step(&self, request: &StepRequest) -> Result<StepResponse, DecodeError> {
        let dist = self
            .step_dists
            .get(&request.step)
            .unwrap_or(&self.default_dist);
        let attention = request
            .sentences
            .iter()
            .map(|&sentence| {
                self.attention
                    .get(sentence)
                    .cloned()
                    .expect("no attention row configured for sentence")
            })
            .collect();

        Ok(StepResponse {
            states: request.states.clone(),
            distributions: vec![dist.clone(); request.states.len()],
            attention,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::DecoderState;

    fn request(step: usize, n: usize) -> StepRequest {
        StepRequest {
            step,
            states: vec![DecoderState::single(vec![1.0]); n],
            prev_symbols: vec![1; n],
            mask: vec![1.0; n],
            sentences: vec![0; n],
        }
    }

    #[tokio::test]
    async fn test_fixed_distribution_for_all_hypotheses() {
        let oracle = MockOracle::fixed(vec![0.1, 0.9], vec![vec![1.0]]);
        let resp = oracle.step(&request(0, 3)).await.unwrap();
        assert_eq!(resp.distributions.len(), 3);
        for row in &resp.distributions {
            assert_eq!(row, &vec![0.1, 0.9]);
        }
    }

    #[tokio::test]
    async fn test_step_override() {
        let mut oracle = MockOracle::fixed(vec![0.1, 0.9], vec![vec![1.0]]);
        oracle.add_step_dist(2, vec![0.8, 0.2]);
        let resp = oracle.step(&request(2, 1)).await.unwrap();
        assert_eq!(resp.distributions[0], vec![0.8, 0.2]);
        let resp = oracle.step(&request(3, 1)).await.unwrap();
        assert_eq!(resp.distributions[0], vec![0.1, 0.9]);
    }

    #[tokio::test]
    async fn test_states_echo_through() {
        let oracle = MockOracle::fixed(vec![1.0], vec![vec![1.0]]);
        let req = request(0, 2);
        let resp = oracle.step(&req).await.unwrap();
        assert_eq!(resp.states, req.states);
    }

    #[test]
    fn test_uniform_attention_rows() {
        let rows = MockOracle::uniform_attention(&[2, 4]);
        assert_eq!(rows[0], vec![0.5, 0.5]);
        assert_eq!(rows[1], vec![0.25; 4]);
    }
}
