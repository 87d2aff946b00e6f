//! Coverage-penalized beam search for batched sequence generation.
//!
//! Explores output sequences for a batch of sentences against a per-step
//! scoring oracle (the model's forward step), keeping a bounded beam of
//! hypotheses per sentence and ranking completions by a length- and
//! coverage-adjusted score. Uses trait-based abstraction so the search
//! can be tested with mocks (no model backend).
//!
//! # Key types
//!
//! - [`BeamDecoder`] — the timestep loop
//! - [`DecodeConfig`] — configuration loaded from TOML
//! - [`StepOracle`] — trait for the model's per-step scoring function
//! - [`Hypothesis`] — one partial or complete candidate sequence
//! - [`StepRequest`] / [`StepResponse`] — the batched oracle exchange

pub mod config;
pub mod engine;
pub mod hypothesis;
pub mod mocks;
pub mod prune;
pub mod scoring;
pub mod step;

pub use config::DecodeConfig;
pub use engine::{BeamDecoder, DecodeError, StepOracle};
pub use hypothesis::{by_sentence, initial_beam, Hypothesis, COVERAGE_FLOOR, NORM_SENTINEL};
pub use step::{DecoderState, StepRequest, StepResponse};
pub use transcript::{DecodeOutcome, DecodeStats, DecodedHypothesis, SentenceDecode};
