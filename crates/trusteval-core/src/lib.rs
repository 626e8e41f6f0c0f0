//! # trusteval-core
//!
//! Answer scoring and provenance verification for evaluation runs.
//!
//! A run is judged on two independent axes:
//! - **Quality**: how well predictions match gold answers (AEM, TokenF1, SpanF1)
//! - **Provenance**: whether the run's manifest is intact and, in STRICT
//!   mode, signed (PI)
//!
//! ## Example
//!
//! ```rust,ignore
//! use trusteval_core::{evaluate_run, OpensslVerifier, ProvenanceVerifier, RunConfig};
//!
//! let config = RunConfig::from_yaml_file("run.yaml")?;
//! let verifier = ProvenanceVerifier::new(OpensslVerifier::new(config.signing_tool()));
//! let outcome = evaluate_run(&config, &verifier)?;
//!
//! println!("{}", outcome.report);
//! ```

pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod provenance;
pub mod report;
pub mod scoring;

// Re-export main types at crate root
pub use config::{ConfigError, RunConfig};
pub use dataset::{DatasetError, Prediction, PredictionIndex, Question};
pub use pipeline::{evaluate_run, evaluate_run_on, score_files, score_questions, RunOutcome};
pub use provenance::{
    provenance_indicator, OpensslVerifier, ProvenanceError, ProvenanceMode, ProvenancePlan,
    ProvenanceRecord, ProvenanceVerifier, SignatureCheck, SignatureStatus, SignatureVerifier,
    SigningTool,
};
pub use report::Report;
pub use scoring::{normalize, score_one, token_overlap_f1, Metrics, ScoreResult};

use thiserror::Error;

/// Errors that abort an evaluation run.
///
/// A failed hash or signature check is not in this list: the run still
/// completes and the failure is recorded in its [`ProvenanceRecord`].
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Provenance input error: {0}")]
    Provenance(#[from] ProvenanceError),
}

impl EvaluationError {
    /// Whether this error comes from the run configuration rather than its inputs.
    pub fn is_config_error(&self) -> bool {
        matches!(self, EvaluationError::Config(_))
    }
}
