//! Per-question scoring against a gold set, and aggregation over a run.

use serde::{Deserialize, Serialize};

use super::text::{normalize, token_overlap_f1};

/// Scores for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 1.0 if the prediction equals any gold answer after normalization
    pub exact_match: f64,

    /// Best token-overlap F1 against any gold answer
    pub token_f1: f64,

    /// Span-level F1. Proxied by `token_f1`; there is no separate span
    /// alignment.
    pub span_f1: f64,
}

/// Score one prediction against every acceptable gold answer.
///
/// Exact match and token F1 each pick their best gold independently.
/// An empty gold set scores 0.0 on every metric.
pub fn score_one<S: AsRef<str>>(prediction: &str, golds: &[S]) -> ScoreResult {
    let normalized = normalize(prediction);

    let exact_match = if golds.iter().any(|g| normalize(g.as_ref()) == normalized) {
        1.0
    } else {
        0.0
    };

    let token_f1 = golds
        .iter()
        .map(|g| token_overlap_f1(prediction, g.as_ref()))
        .fold(0.0, f64::max);

    ScoreResult {
        exact_match,
        token_f1,
        span_f1: token_f1,
    }
}

/// Run-level metrics: means over all questions, rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "AEM")]
    pub aem: f64,

    #[serde(rename = "TokenF1")]
    pub token_f1: f64,

    #[serde(rename = "SpanF1")]
    pub span_f1: f64,
}

impl Metrics {
    /// Aggregate per-question scores. An empty run yields all zeros.
    pub fn aggregate(scores: &[ScoreResult]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }

        let n = scores.len() as f64;
        let mean = |f: fn(&ScoreResult) -> f64| round4(scores.iter().map(f).sum::<f64>() / n);

        Self {
            aem: mean(|s| s.exact_match),
            token_f1: mean(|s| s.token_f1),
            span_f1: mean(|s| s.span_f1),
        }
    }
}

/// Round to 4 decimal places, half away from zero.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
