//! Combines the manifest hash check and signature check into a record.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::hash::{verify_manifest_hash, HashCheck};
use super::signature::{OpensslVerifier, SignatureCheck, SignatureVerifier};
use super::{provenance_indicator, ProvenanceError, ProvenanceMode};

/// What to verify for a run.
///
/// STRICT carries its signature inputs, so a STRICT plan without them
/// cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenancePlan {
    Derived,
    Strict {
        signature: PathBuf,
        public_key: PathBuf,
    },
}

impl ProvenancePlan {
    pub fn mode(&self) -> ProvenanceMode {
        match self {
            ProvenancePlan::Derived => ProvenanceMode::Derived,
            ProvenancePlan::Strict { .. } => ProvenanceMode::Strict,
        }
    }
}

/// Verification outcomes for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceRecord {
    pub mode: ProvenanceMode,
    pub hash: HashCheck,

    /// Present only in STRICT mode
    pub signature: Option<SignatureCheck>,
}

impl ProvenanceRecord {
    pub fn manifest_hash_ok(&self) -> bool {
        self.hash.matched
    }

    pub fn signature_verified(&self) -> bool {
        self.signature
            .as_ref()
            .map(SignatureCheck::is_verified)
            .unwrap_or(false)
    }

    /// The Provenance Indicator: 1.0, 0.5 or 0.0.
    pub fn indicator(&self) -> f64 {
        provenance_indicator(self.mode, self.manifest_hash_ok(), self.signature_verified())
    }

    /// Whether the run satisfies its declared mode.
    ///
    /// DERIVED always passes. STRICT passes only with full trust.
    pub fn passed(&self) -> bool {
        match self.mode {
            ProvenanceMode::Derived => true,
            ProvenanceMode::Strict => self.indicator() == 1.0,
        }
    }

    /// One-line description of why a STRICT run failed, if it did.
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed() {
            return None;
        }

        let mut reasons = Vec::new();
        if !self.manifest_hash_ok() {
            reasons.push(format!(
                "manifest hash mismatch (expected {}, computed {})",
                self.hash.expected, self.hash.actual
            ));
        }
        match &self.signature {
            Some(check) if !check.is_verified() => {
                reasons.push(format!("signature {}: {}", check.status, check.message));
            }
            None => reasons.push("signature not checked".to_string()),
            _ => {}
        }

        Some(reasons.join("; "))
    }
}

/// Runs the hash check and, in STRICT mode, the signature check.
pub struct ProvenanceVerifier<V = OpensslVerifier> {
    signer: V,
}

impl<V: SignatureVerifier> ProvenanceVerifier<V> {
    pub fn new(signer: V) -> Self {
        Self { signer }
    }

    /// Verify a manifest against its hash record according to `plan`.
    ///
    /// The hash is always checked. The signature is checked over the hash
    /// record file only for STRICT plans.
    pub fn verify(
        &self,
        plan: &ProvenancePlan,
        manifest: &Path,
        hash_record: &Path,
    ) -> Result<ProvenanceRecord, ProvenanceError> {
        let hash = verify_manifest_hash(manifest, hash_record)?;

        let signature = match plan {
            ProvenancePlan::Derived => None,
            ProvenancePlan::Strict {
                signature,
                public_key,
            } => Some(self.signer.verify(hash_record, signature, public_key)),
        };

        let record = ProvenanceRecord {
            mode: plan.mode(),
            hash,
            signature,
        };

        tracing::info!(
            mode = %record.mode,
            manifest_hash_ok = record.manifest_hash_ok(),
            signature_verified = record.signature_verified(),
            pi = record.indicator(),
            "Provenance verified"
        );

        Ok(record)
    }
}
