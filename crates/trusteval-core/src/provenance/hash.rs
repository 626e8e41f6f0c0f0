//! Manifest content hashing and comparison against a checksum record.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::ProvenanceError;

/// Manifests are hashed in chunks of this size.
pub const CHUNK_SIZE: usize = 64 * 1024;

lazy_static! {
    /// Lowercase hex SHA-256 digest, as produced by `sha256sum`.
    static ref SHA256_HEX: Regex = Regex::new(r"^[0-9a-f]{64}$").unwrap();
}

/// Outcome of comparing a manifest against its declared hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashCheck {
    pub matched: bool,

    /// First token of the hash record
    pub expected: String,

    /// Digest recomputed from the manifest bytes
    pub actual: String,
}

/// SHA-256 of a file as lowercase hex, read in fixed-size chunks.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String, ProvenanceError> {
    let path = path.as_ref();
    let io_err = |source: io::Error| ProvenanceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    hash_reader(BufReader::with_capacity(CHUNK_SIZE, file)).map_err(io_err)
}

/// SHA-256 of everything `reader` yields. Interrupted reads are retried.
fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Extract the expected digest from a checksum record.
///
/// Accepts a bare digest or the `<hex>  <filename>` checksum-file layout;
/// only the first whitespace-delimited token is used.
pub fn parse_hash_record(record: &str) -> Option<&str> {
    record.split_whitespace().next()
}

/// Compare the manifest's SHA-256 with the digest declared in `hash_record`.
///
/// The comparison is exact and case-sensitive.
pub fn verify_manifest_hash(
    manifest: impl AsRef<Path>,
    hash_record: impl AsRef<Path>,
) -> Result<HashCheck, ProvenanceError> {
    let hash_record = hash_record.as_ref();
    let contents = fs::read_to_string(hash_record).map_err(|source| ProvenanceError::Io {
        path: hash_record.to_path_buf(),
        source,
    })?;

    let expected = parse_hash_record(&contents)
        .ok_or_else(|| ProvenanceError::EmptyHashRecord(hash_record.to_path_buf()))?
        .to_string();

    if !SHA256_HEX.is_match(&expected) {
        tracing::warn!(
            path = %hash_record.display(),
            expected = %expected,
            "Hash record does not look like a lowercase SHA-256 digest"
        );
    }

    let actual = sha256_file(manifest)?;
    let matched = actual == expected;

    tracing::info!(matched, expected = %expected, actual = %actual, "Manifest hash checked");

    Ok(HashCheck {
        matched,
        expected,
        actual,
    })
}
