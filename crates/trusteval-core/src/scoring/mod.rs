//! Answer scoring.
//!
//! Predictions are compared with every acceptable gold answer for a question:
//! - **Exact match**: normalized prediction equals some normalized gold
//! - **Token F1**: greedy one-to-one token overlap, best over all golds
//! - **Span F1**: currently the same number as token F1

mod scorer;
mod text;

pub use scorer::{round4, score_one, Metrics, ScoreResult};
pub use text::{normalize, token_overlap_f1, tokens};
