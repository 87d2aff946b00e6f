//! Downstream-facing decode results.
//!
//! The decoder crate produces these types; the service layer and the
//! detokenizer consume them without depending on beam-search internals.

pub mod types;

pub use types::{DecodeOutcome, DecodeStats, DecodedHypothesis, SentenceDecode};
