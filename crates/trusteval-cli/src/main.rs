//! `trusteval`: score an evaluation run and verify its provenance.
//!
//! Exit codes:
//! - 0: report written, provenance mode satisfied
//! - 1: input or I/O error, no report written
//! - 2: STRICT mode without `--manifest-sig` and `--pubkey`, or a command
//!   line usage error reported by clap
//! - 3: STRICT mode verification failed (report is still written)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use trusteval_core::{
    evaluate_run, score_files, EvaluationError, OpensslVerifier, ProvenanceMode,
    ProvenanceVerifier, RunConfig, RunOutcome, SignatureVerifier,
};

const EXIT_OK: u8 = 0;
const EXIT_INPUT_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_VERIFICATION_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "trusteval")]
#[command(about = "Score model answers against gold references and verify run provenance")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a run and write JSON and HTML reports
    Run(RunArgs),

    /// Score predictions only and print the metrics as JSON
    Score {
        /// Questions with gold answers (JSONL)
        #[arg(long)]
        qas: PathBuf,

        /// Model predictions (JSONL)
        #[arg(long)]
        pred: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Run configuration (YAML); replaces the individual flags
    #[arg(long, conflicts_with_all = ["sources", "qas", "pred", "manifest", "manifest_hash", "provenance", "run_name"])]
    config: Option<PathBuf>,

    /// Source documents (JSONL)
    #[arg(long, required_unless_present = "config")]
    sources: Option<PathBuf>,

    /// Questions with gold answers (JSONL)
    #[arg(long, required_unless_present = "config")]
    qas: Option<PathBuf>,

    /// Model predictions (JSONL)
    #[arg(long, required_unless_present = "config")]
    pred: Option<PathBuf>,

    /// Manifest file whose hash is checked
    #[arg(long, required_unless_present = "config")]
    manifest: Option<PathBuf>,

    /// Hash record for the manifest
    #[arg(long, required_unless_present = "config")]
    manifest_hash: Option<PathBuf>,

    /// Detached signature over the hash record (STRICT only)
    #[arg(long)]
    manifest_sig: Option<PathBuf>,

    /// Public key for the signature (STRICT only)
    #[arg(long)]
    pubkey: Option<PathBuf>,

    /// Provenance mode: DERIVED or STRICT
    #[arg(long, required_unless_present = "config")]
    provenance: Option<ProvenanceMode>,

    /// Run name recorded in the report
    #[arg(long, required_unless_present = "config")]
    run_name: Option<String>,

    /// JSON report path
    #[arg(long)]
    out: Option<PathBuf>,

    /// HTML report path
    #[arg(long)]
    html: Option<PathBuf>,

    /// Signing utility to use instead of searching PATH
    #[arg(long)]
    openssl: Option<PathBuf>,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match self.config {
            Some(path) => RunConfig::from_yaml_file(&path)
                .with_context(|| format!("Failed to load run config {}", path.display()))?,
            None => RunConfig {
                run_name: required(self.run_name, "--run-name")?,
                provenance: required(self.provenance, "--provenance")?,
                sources: required(self.sources, "--sources")?,
                qas: required(self.qas, "--qas")?,
                predictions: required(self.pred, "--pred")?,
                manifest: required(self.manifest, "--manifest")?,
                manifest_hash: required(self.manifest_hash, "--manifest-hash")?,
                manifest_sig: None,
                pubkey: None,
                openssl: None,
                out: PathBuf::from("report.json"),
                html: PathBuf::from("report.html"),
            },
        };

        if self.manifest_sig.is_some() {
            config.manifest_sig = self.manifest_sig;
        }
        if self.pubkey.is_some() {
            config.pubkey = self.pubkey;
        }
        if self.openssl.is_some() {
            config.openssl = self.openssl;
        }
        if let Some(out) = self.out {
            config.out = out;
        }
        if let Some(html) = self.html {
            config.html = html;
        }

        Ok(config)
    }
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    value.with_context(|| format!("{} is required", flag))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Score { qas, pred } => score(&qas, &pred),
    };

    ExitCode::from(result.unwrap_or_else(|err| {
        eprintln!("Error: {:#}", err);
        exit_code(&err)
    }))
}

/// Exit status for an error that aborted the command.
fn exit_code(err: &anyhow::Error) -> u8 {
    let config_error = err
        .downcast_ref::<EvaluationError>()
        .is_some_and(EvaluationError::is_config_error);
    if config_error {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_INPUT_ERROR
    }
}

fn init_tracing(verbose: u8) {
    let rust_log = std::env::var("RUST_LOG").ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .init();
}

/// `RUST_LOG` wins when set; otherwise WARN, raised by `-v`/`-vv`.
///
/// WARN keeps stdout for the report summary.
fn log_filter(verbose: u8, rust_log: Option<&str>) -> EnvFilter {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

fn run(args: RunArgs) -> Result<u8> {
    let config = args.into_config()?;

    // Fail on a bad STRICT setup before resolving tools or touching inputs.
    config.validate().map_err(EvaluationError::from)?;

    let verifier = ProvenanceVerifier::new(OpensslVerifier::new(config.signing_tool()));
    run_with(&config, &verifier)
}

/// Evaluate, write both reports, then map the provenance outcome to an exit code.
fn run_with<V: SignatureVerifier>(
    config: &RunConfig,
    verifier: &ProvenanceVerifier<V>,
) -> Result<u8> {
    let outcome = evaluate_run(config, verifier)?;

    write_reports(config, &outcome)?;
    println!("Wrote {} and {}", config.out.display(), config.html.display());
    println!("{}", outcome.report);

    if config.provenance == ProvenanceMode::Strict {
        match outcome.provenance.failure_reason() {
            None => println!("Signature verify: OK"),
            Some(reason) => {
                println!("Signature verify: FAIL ({})", reason);
                return Ok(EXIT_VERIFICATION_FAILED);
            }
        }
    }

    Ok(EXIT_OK)
}

fn write_reports(config: &RunConfig, outcome: &RunOutcome) -> Result<()> {
    let json = outcome.report.to_json().context("Failed to serialize report")?;
    write_file(&config.out, &json)?;
    write_file(&config.html, &outcome.report.to_html())?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn score(qas: &Path, pred: &Path) -> Result<u8> {
    let metrics = score_files(qas, pred)?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(EXIT_OK)
}
