//! SHA-256 content hashing of downloaded archives.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Lowercase hex SHA-256 of a file's contents.
pub async fn compute_sha256(path: &Path) -> Result<String> {
    debug!("Computing SHA256 checksum for: {}", path.display());

    let contents =
        fs::read(path).await.with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `path` exists and hashes to `expected` (hex, any case).
///
/// An unreadable file is a mismatch, not an error: the caller's answer to both
/// is downloading it again.
pub async fn file_matches(path: &Path, expected: &str) -> bool {
    match compute_sha256(path).await {
        Ok(actual) => {
            let matches = actual.eq_ignore_ascii_case(expected);
            if !matches {
                debug!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    path.display(),
                    expected,
                    actual
                );
            }
            matches
        }
        Err(e) => {
            debug!("{:#}", e);
            false
        }
    }
}
