//! Detached signature verification over the manifest hash record.
//!
//! Verification is delegated to an external signing utility. The utility is
//! located once, up front, and the resolved [`SigningTool`] is handed to the
//! verifier so lookup never happens mid-run.

use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Executable name searched for on `PATH`.
pub const OPENSSL_PROGRAM: &str = "openssl";

/// Location tried when `openssl` is not on `PATH` (Homebrew, Apple Silicon).
pub const OPENSSL_FALLBACK_PATH: &str = "/opt/homebrew/opt/openssl@3/bin/openssl";

/// Diagnostic used when no signing utility could be located.
pub const TOOL_NOT_FOUND: &str = "openssl not found";

/// Result category of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// The utility accepted the signature
    Verified,

    /// The utility ran and rejected the signature
    Rejected,

    /// The utility could not be located or started; nothing was verified
    Unavailable,
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureStatus::Verified => write!(f, "verified"),
            SignatureStatus::Rejected => write!(f, "rejected"),
            SignatureStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Outcome of a signature check with the utility's own diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCheck {
    pub status: SignatureStatus,
    pub message: String,
}

impl SignatureCheck {
    pub fn verified(message: impl Into<String>) -> Self {
        Self {
            status: SignatureStatus::Verified,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: SignatureStatus::Rejected,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: SignatureStatus::Unavailable,
            message: message.into(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == SignatureStatus::Verified
    }
}

/// Verifies a detached signature over a hash record file.
///
/// Implementations must not panic on a bad signature; every outcome is
/// reported through [`SignatureCheck`].
pub trait SignatureVerifier {
    fn verify(&self, hash_file: &Path, sig_file: &Path, pub_key_file: &Path) -> SignatureCheck;
}

/// A signing utility resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningTool {
    Located(PathBuf),
    Missing,
}

impl SigningTool {
    /// Look up `openssl` on the process `PATH`, then at the fallback location.
    pub fn resolve() -> Self {
        Self::resolve_in(env::var_os("PATH"), Path::new(OPENSSL_FALLBACK_PATH))
    }

    /// Look up `openssl` on an explicit search path, then at `fallback`.
    pub fn resolve_in(search_path: Option<OsString>, fallback: &Path) -> Self {
        let program = format!("{}{}", OPENSSL_PROGRAM, env::consts::EXE_SUFFIX);

        let on_path = search_path.and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(&program))
                .find(|candidate| candidate.is_file())
        });

        let tool = match on_path {
            Some(path) => Self::Located(path),
            None if fallback.is_file() => Self::Located(fallback.to_path_buf()),
            None => Self::Missing,
        };

        tracing::debug!(tool = ?tool, "Resolved signing tool");
        tool
    }

    /// Use an explicitly configured executable.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_file() {
            Self::Located(path)
        } else {
            Self::Missing
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Located(path) => Some(path),
            Self::Missing => None,
        }
    }
}

/// Verifies signatures with `openssl pkeyutl -verify`.
#[derive(Debug, Clone)]
pub struct OpensslVerifier {
    tool: SigningTool,
}

impl OpensslVerifier {
    pub fn new(tool: SigningTool) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &SigningTool {
        &self.tool
    }
}

impl SignatureVerifier for OpensslVerifier {
    fn verify(&self, hash_file: &Path, sig_file: &Path, pub_key_file: &Path) -> SignatureCheck {
        let Some(program) = self.tool.path() else {
            tracing::error!("Signing utility not found; signature was not checked");
            return SignatureCheck::unavailable(TOOL_NOT_FOUND);
        };

        let output = Command::new(program)
            .args(["pkeyutl", "-verify", "-pubin", "-inkey"])
            .arg(pub_key_file)
            .arg("-in")
            .arg(hash_file)
            .arg("-sigfile")
            .arg(sig_file)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(tool = %program.display(), error = %e, "Failed to run signing utility");
                return SignatureCheck::unavailable(format!(
                    "failed to run {}: {}",
                    program.display(),
                    e
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if !stdout.is_empty() {
            stdout
        } else if !stderr.is_empty() {
            stderr
        } else {
            match output.status.code() {
                Some(code) => format!("returncode={}", code),
                None => "terminated by signal".to_string(),
            }
        };

        if output.status.success() {
            tracing::info!(tool = %program.display(), "Signature verified");
            SignatureCheck::verified(message)
        } else {
            tracing::warn!(tool = %program.display(), message = %message, "Signature rejected");
            SignatureCheck::rejected(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tool_is_unavailable() {
        let verifier = OpensslVerifier::new(SigningTool::Missing);
        let check = verifier.verify(
            Path::new("manifest.sha256"),
            Path::new("manifest.sig"),
            Path::new("pub.pem"),
        );

        assert_eq!(check.status, SignatureStatus::Unavailable);
        assert_eq!(check.message, TOOL_NOT_FOUND);
        assert!(!check.is_verified());
    }

    #[test]
    fn test_resolve_with_nothing_available() {
        let empty = TempDir::new().unwrap();
        let tool = SigningTool::resolve_in(
            Some(empty.path().as_os_str().to_owned()),
            &empty.path().join("no-such-openssl"),
        );
        assert_eq!(tool, SigningTool::Missing);
    }

    #[test]
    fn test_resolve_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("openssl-fallback");
        std::fs::write(&fallback, b"").unwrap();

        let tool = SigningTool::resolve_in(None, &fallback);
        assert_eq!(tool, SigningTool::Located(fallback));
    }

    #[test]
    fn test_resolve_prefers_search_path() {
        let bin = TempDir::new().unwrap();
        let program = bin
            .path()
            .join(format!("{}{}", OPENSSL_PROGRAM, env::consts::EXE_SUFFIX));
        std::fs::write(&program, b"").unwrap();

        let fallback = bin.path().join("openssl-fallback");
        std::fs::write(&fallback, b"").unwrap();

        let tool = SigningTool::resolve_in(Some(bin.path().as_os_str().to_owned()), &fallback);
        assert_eq!(tool, SigningTool::Located(program));
    }

    #[test]
    fn test_from_path_requires_existing_file() {
        assert_eq!(
            SigningTool::from_path("/nonexistent/openssl"),
            SigningTool::Missing
        );
    }

    #[cfg(unix)]
    mod fake_openssl {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("openssl");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn verify_with(body: &str) -> SignatureCheck {
            let dir = TempDir::new().unwrap();
            let verifier = OpensslVerifier::new(SigningTool::Located(script(&dir, body)));

            // A sibling test forking while the script is open for writing
            // makes exec fail with ETXTBSY; retry briefly.
            let mut attempts = 0;
            loop {
                let check = verifier.verify(
                    Path::new("manifest.sha256"),
                    Path::new("manifest.sig"),
                    Path::new("pub.pem"),
                );
                attempts += 1;
                if check.status != SignatureStatus::Unavailable || attempts >= 10 {
                    return check;
                }
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
        }

        #[test]
        fn test_success_uses_stdout() {
            let check = verify_with(
                r#"[ "$1" = "pkeyutl" ] || exit 9
echo "Signature Verified Successfully""#,
            );
            assert_eq!(check, SignatureCheck::verified("Signature Verified Successfully"));
        }

        #[test]
        fn test_failure_uses_stderr() {
            let check = verify_with(
                r#"echo "Signature Verification Failure" >&2
exit 1"#,
            );
            assert_eq!(check, SignatureCheck::rejected("Signature Verification Failure"));
        }

        #[test]
        fn test_silent_failure_reports_return_code() {
            let check = verify_with("exit 4");
            assert_eq!(check, SignatureCheck::rejected("returncode=4"));
        }

        #[test]
        fn test_arguments_are_passed_in_order() {
            let check = verify_with(
                r#"[ "$*" = "pkeyutl -verify -pubin -inkey pub.pem -in manifest.sha256 -sigfile manifest.sig" ] || exit 7
echo ok"#,
            );
            assert!(check.is_verified(), "{:?}", check);
        }
    }
}
