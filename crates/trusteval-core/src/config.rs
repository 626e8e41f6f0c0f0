//! Run configuration.
//!
//! A run is described by a [`RunConfig`], either parsed from YAML or
//! assembled by the CLI. Validation happens before any input is read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::provenance::{ProvenanceMode, ProvenancePlan, SigningTool};

/// Errors in the run configuration itself.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("STRICT provenance requires both a manifest signature and a public key (missing: {0})")]
    StrictRequiresSignature(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Everything needed to evaluate one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human-readable run name, copied into the report
    pub run_name: String,

    /// Provenance mode claimed by the run
    pub provenance: ProvenanceMode,

    /// Source documents (JSONL); loaded but not scored
    pub sources: PathBuf,

    /// Questions with gold answers (JSONL)
    pub qas: PathBuf,

    /// Model predictions (JSONL)
    pub predictions: PathBuf,

    /// Manifest whose hash is checked
    pub manifest: PathBuf,

    /// Hash record for the manifest (`<hex>` or `<hex>  <filename>`)
    pub manifest_hash: PathBuf,

    /// Detached signature over the hash record (STRICT only)
    #[serde(default)]
    pub manifest_sig: Option<PathBuf>,

    /// Public key for the signature (STRICT only)
    #[serde(default)]
    pub pubkey: Option<PathBuf>,

    /// Explicit signing utility; looked up on PATH when absent
    #[serde(default)]
    pub openssl: Option<PathBuf>,

    #[serde(default = "default_json_out")]
    pub out: PathBuf,

    #[serde(default = "default_html_out")]
    pub html: PathBuf,
}

/// An optional path that was actually supplied; `""` counts as absent.
fn given(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

fn default_json_out() -> PathBuf {
    PathBuf::from("report.json")
}

fn default_html_out() -> PathBuf {
    PathBuf::from("report.html")
}

impl RunConfig {
    /// Parse a run config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Parse a run config from a YAML file.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }

        Ok(config)
    }

    /// Check the config and derive the provenance plan.
    ///
    /// This is the configuration gate: a STRICT run missing its signature
    /// or public key fails here, before any input file is touched.
    pub fn validate(&self) -> Result<ProvenancePlan, ConfigError> {
        if self.run_name.trim().is_empty() {
            return Err(ConfigError::MissingField("run_name".to_string()));
        }

        match self.provenance {
            ProvenanceMode::Derived => Ok(ProvenancePlan::Derived),
            ProvenanceMode::Strict => match (given(&self.manifest_sig), given(&self.pubkey)) {
                (Some(signature), Some(public_key)) => Ok(ProvenancePlan::Strict {
                    signature: signature.to_path_buf(),
                    public_key: public_key.to_path_buf(),
                }),
                (None, Some(_)) => Err(ConfigError::StrictRequiresSignature("manifest_sig".into())),
                (Some(_), None) => Err(ConfigError::StrictRequiresSignature("pubkey".into())),
                (None, None) => Err(ConfigError::StrictRequiresSignature(
                    "manifest_sig, pubkey".into(),
                )),
            },
        }
    }

    /// Resolve the signing utility for this run.
    pub fn signing_tool(&self) -> SigningTool {
        match &self.openssl {
            Some(path) => SigningTool::from_path(path),
            None => SigningTool::resolve(),
        }
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        join(&mut self.sources);
        join(&mut self.qas);
        join(&mut self.predictions);
        join(&mut self.manifest);
        join(&mut self.manifest_hash);
        join(&mut self.out);
        join(&mut self.html);
        for p in [&mut self.manifest_sig, &mut self.pubkey, &mut self.openssl]
            .into_iter()
            .flatten()
        {
            join(p);
        }
    }
}
