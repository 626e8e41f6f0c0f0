//! Run orchestration: configuration gate, provenance, loading, scoring.

use chrono::{NaiveDate, Utc};
use std::path::Path;

use crate::config::RunConfig;
use crate::dataset::{load_predictions, load_questions, load_sources, PredictionIndex, Question};
use crate::provenance::{ProvenanceRecord, ProvenanceVerifier, SignatureVerifier};
use crate::report::Report;
use crate::scoring::{score_one, Metrics, ScoreResult};
use crate::EvaluationError;

/// A finished run: the report plus the full provenance record behind it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub provenance: ProvenanceRecord,
}

impl RunOutcome {
    /// Whether the run met its declared provenance mode.
    pub fn passed(&self) -> bool {
        self.provenance.passed()
    }
}

/// Score every question; missing predictions count as empty answers.
pub fn score_questions(questions: &[Question], predictions: &PredictionIndex) -> Vec<ScoreResult> {
    questions
        .iter()
        .map(|q| {
            let answer = predictions.answer_for(&q.id);
            if answer.is_empty() {
                tracing::debug!(question = %q.id, "No prediction; scoring empty answer");
            }
            score_one(answer, &q.answers)
        })
        .collect()
}

/// Load questions and predictions and aggregate the text metrics.
pub fn score_files(qas: &Path, predictions: &Path) -> Result<Metrics, EvaluationError> {
    let questions = load_questions(qas)?;
    let predictions = load_predictions(predictions)?;

    tracing::info!(
        questions = questions.len(),
        predictions = predictions.len(),
        "Scoring predictions"
    );

    Ok(Metrics::aggregate(&score_questions(&questions, &predictions)))
}

/// Evaluate a run using today's UTC date.
pub fn evaluate_run<V: SignatureVerifier>(
    config: &RunConfig,
    verifier: &ProvenanceVerifier<V>,
) -> Result<RunOutcome, EvaluationError> {
    evaluate_run_on(config, verifier, Utc::now().date_naive())
}

/// Evaluate a run for a given report date.
///
/// Order matters: the config is validated before any file is read, then
/// provenance is checked, then inputs are loaded and scored. Verification
/// failures do not abort; they are carried in the outcome.
pub fn evaluate_run_on<V: SignatureVerifier>(
    config: &RunConfig,
    verifier: &ProvenanceVerifier<V>,
    date: NaiveDate,
) -> Result<RunOutcome, EvaluationError> {
    let plan = config.validate()?;

    let provenance = verifier.verify(&plan, &config.manifest, &config.manifest_hash)?;

    let sources = load_sources(&config.sources)?;
    tracing::debug!(sources = sources.len(), "Loaded sources");

    let metrics = score_files(&config.qas, &config.predictions)?;
    let report = Report::new(config.run_name.clone(), date, metrics, &provenance);

    tracing::info!(run = %report.run_name, aem = report.aem, token_f1 = report.token_f1, pi = report.pi, "Run evaluated");

    Ok(RunOutcome { report, provenance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::provenance::{ProvenanceMode, SignatureCheck};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    struct StubSigner(SignatureCheck);

    impl SignatureVerifier for StubSigner {
        fn verify(&self, _hash: &Path, _sig: &Path, _key: &Path) -> SignatureCheck {
            self.0.clone()
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Two questions: one answered exactly (modulo case/space), one unanswered.
    fn two_question_run(dir: &TempDir, mode: ProvenanceMode) -> RunConfig {
        RunConfig {
            run_name: "two-questions".to_string(),
            provenance: mode,
            sources: write(dir, "sources.jsonl", "{\"id\": \"s1\", \"text\": \"Paris is in France.\"}\n"),
            qas: write(
                dir,
                "qas.jsonl",
                "{\"id\": \"q1\", \"answers\": [\"Paris\"]}\n{\"qid\": \"q2\", \"gold\": [\"Berlin\"]}\n",
            ),
            predictions: write(dir, "pred.jsonl", "{\"id\": \"q1\", \"answer\": \"  PARIS \"}\n"),
            manifest: write(dir, "manifest.json", "hello\n"),
            manifest_hash: write(dir, "manifest.sha256", &format!("{}  manifest.json\n", HELLO_SHA256)),
            manifest_sig: None,
            pubkey: None,
            openssl: None,
            out: dir.path().join("report.json"),
            html: dir.path().join("report.html"),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    #[test]
    fn test_end_to_end_derived() {
        let dir = TempDir::new().unwrap();
        let config = two_question_run(&dir, ProvenanceMode::Derived);
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("unused")));

        let outcome = evaluate_run_on(&config, &verifier, date()).unwrap();
        let report = outcome.report;

        assert_eq!(report.aem, 0.5);
        assert_eq!(report.token_f1, 0.5);
        assert_eq!(report.span_f1, 0.5);
        assert_eq!(report.pi, 0.5);
        assert!(report.manifest_hash_ok);
        assert!(!report.signature_verified);
        assert!(outcome.provenance.passed());
    }

    #[test]
    fn test_end_to_end_strict_verified() {
        let dir = TempDir::new().unwrap();
        let mut config = two_question_run(&dir, ProvenanceMode::Strict);
        config.manifest_sig = Some(dir.path().join("manifest.json.sig"));
        config.pubkey = Some(dir.path().join("pub.pem"));
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("Signature Verified Successfully")));

        let outcome = evaluate_run_on(&config, &verifier, date()).unwrap();
        assert_eq!(outcome.report.pi, 1.0);
        assert!(outcome.report.signature_verified);
        assert!(outcome.passed());
    }

    #[test]
    fn test_end_to_end_strict_rejected_still_reports() {
        let dir = TempDir::new().unwrap();
        let mut config = two_question_run(&dir, ProvenanceMode::Strict);
        config.manifest_sig = Some(dir.path().join("manifest.json.sig"));
        config.pubkey = Some(dir.path().join("pub.pem"));
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::rejected("bad signature")));

        let outcome = evaluate_run_on(&config, &verifier, date()).unwrap();
        assert_eq!(outcome.report.pi, 0.0);
        assert_eq!(outcome.report.aem, 0.5);
        assert!(!outcome.passed());
    }

    #[test]
    fn test_strict_without_inputs_fails_before_reading_files() {
        let dir = TempDir::new().unwrap();
        let mut config = two_question_run(&dir, ProvenanceMode::Strict);
        // Inputs that do not exist would be an input error if they were read.
        config.qas = dir.path().join("missing.jsonl");
        config.manifest = dir.path().join("missing-manifest.json");
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("unused")));

        let result = evaluate_run_on(&config, &verifier, date());
        assert!(matches!(
            result,
            Err(EvaluationError::Config(ConfigError::StrictRequiresSignature(_)))
        ));
    }

    #[test]
    fn test_missing_input_is_input_error() {
        let dir = TempDir::new().unwrap();
        let mut config = two_question_run(&dir, ProvenanceMode::Derived);
        config.predictions = dir.path().join("missing.jsonl");
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("unused")));

        let result = evaluate_run_on(&config, &verifier, date());
        assert!(matches!(result, Err(EvaluationError::Dataset(_))));
    }

    #[test]
    fn test_empty_question_set() {
        let dir = TempDir::new().unwrap();
        let mut config = two_question_run(&dir, ProvenanceMode::Derived);
        config.qas = write(&dir, "empty.jsonl", "\n");
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("unused")));

        let report = evaluate_run_on(&config, &verifier, date()).unwrap().report;
        assert_eq!((report.aem, report.token_f1, report.span_f1), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_demo_run() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/run.yaml");
        let config = RunConfig::from_yaml_file(&path).unwrap();
        let verifier = ProvenanceVerifier::new(StubSigner(SignatureCheck::verified("unused")));

        let report = evaluate_run_on(&config, &verifier, date()).unwrap().report;
        assert_eq!(report.run_name, "capitals-baseline");
        assert_eq!(report.aem, 0.3333);
        assert_eq!(report.token_f1, 0.6);
        assert_eq!(report.pi, 0.5);
        assert!(report.manifest_hash_ok);
    }

    #[test]
    fn test_score_questions_missing_prediction_is_empty_answer() {
        let questions = vec![Question { id: "q1".into(), answers: vec!["yes".into()] }];
        let scores = score_questions(&questions, &PredictionIndex::new());
        assert_eq!(scores[0].exact_match, 0.0);
        assert_eq!(scores[0].token_f1, 0.0);
    }
}
