//! Provenance verification for evaluation runs.
//!
//! Produces the Provenance Indicator (PI):
//! 1. STRICT with a matching manifest hash AND a verified signature → 1.0
//! 2. DERIVED → 0.5 (no signature is checked, hash outcome is only reported)
//! 3. Anything else → 0.0

mod hash;
mod signature;
mod verifier;

pub use hash::{parse_hash_record, sha256_file, verify_manifest_hash, HashCheck, CHUNK_SIZE};
pub use signature::{
    OpensslVerifier, SignatureCheck, SignatureStatus, SignatureVerifier, SigningTool,
    OPENSSL_FALLBACK_PATH, OPENSSL_PROGRAM, TOOL_NOT_FOUND,
};
pub use verifier::{ProvenancePlan, ProvenanceRecord, ProvenanceVerifier};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that prevent a provenance check from completing.
///
/// A hash mismatch or rejected signature is not an error; it is recorded
/// in the [`ProvenanceRecord`].
#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hash record is empty: {}", .0.display())]
    EmptyHashRecord(PathBuf),
}

/// How much provenance a run claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum ProvenanceMode {
    /// Data derived from sources without a signed manifest
    Derived,

    /// Manifest hash must be signed and the signature verified
    Strict,
}

impl ProvenanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceMode::Derived => "DERIVED",
            ProvenanceMode::Strict => "STRICT",
        }
    }
}

impl fmt::Display for ProvenanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DERIVED" => Ok(ProvenanceMode::Derived),
            "STRICT" => Ok(ProvenanceMode::Strict),
            other => Err(format!(
                "unknown provenance mode '{}' (expected DERIVED or STRICT)",
                other
            )),
        }
    }
}

impl TryFrom<String> for ProvenanceMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The Provenance Indicator for a mode and its verification outcomes.
pub fn provenance_indicator(mode: ProvenanceMode, hash_ok: bool, signature_ok: bool) -> f64 {
    match mode {
        ProvenanceMode::Strict if hash_ok && signature_ok => 1.0,
        ProvenanceMode::Strict => 0.0,
        ProvenanceMode::Derived => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_ignores_hash_outcome() {
        assert_eq!(provenance_indicator(ProvenanceMode::Derived, true, false), 0.5);
        assert_eq!(provenance_indicator(ProvenanceMode::Derived, false, false), 0.5);
        assert_eq!(provenance_indicator(ProvenanceMode::Derived, false, true), 0.5);
    }

    #[test]
    fn test_strict_requires_hash_and_signature() {
        assert_eq!(provenance_indicator(ProvenanceMode::Strict, true, true), 1.0);
        assert_eq!(provenance_indicator(ProvenanceMode::Strict, true, false), 0.0);
        assert_eq!(provenance_indicator(ProvenanceMode::Strict, false, true), 0.0);
        assert_eq!(provenance_indicator(ProvenanceMode::Strict, false, false), 0.0);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("STRICT".parse::<ProvenanceMode>(), Ok(ProvenanceMode::Strict));
        assert_eq!("derived".parse::<ProvenanceMode>(), Ok(ProvenanceMode::Derived));
        assert!("SIGNED".parse::<ProvenanceMode>().is_err());
    }

    #[test]
    fn test_mode_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ProvenanceMode::Strict).unwrap(),
            "\"STRICT\""
        );
        assert_eq!(ProvenanceMode::Derived.to_string(), "DERIVED");
    }

    #[test]
    fn test_mode_deserializes_any_case() {
        let mode: ProvenanceMode = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, ProvenanceMode::Strict);

        let mode: ProvenanceMode = serde_json::from_str("\"Derived\"").unwrap();
        assert_eq!(mode, ProvenanceMode::Derived);

        assert!(serde_json::from_str::<ProvenanceMode>("\"signed\"").is_err());
    }
}
