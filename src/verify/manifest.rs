//! Checksum manifests (`SHA256SUMS.asc`, `manifest-<tag>.txt`).
//!
//! A manifest lists `<64 hex digits><spaces><file name>` lines. It may be
//! clearsigned, in which case only the signed section between the
//! `BEGIN PGP SIGNED MESSAGE` and `BEGIN PGP SIGNATURE` armor lines counts.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;

const SIGNED_MESSAGE_BEGIN: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_BEGIN: &str = "-----BEGIN PGP SIGNATURE-----";

/// The signed lines of a checksum manifest.
#[derive(Debug, Clone)]
pub struct ChecksumManifest {
    lines: Vec<String>,
}

impl ChecksumManifest {
    /// Keep the signed section of `text`, or all of it when it is not clearsigned.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let begin = lines.iter().position(|line| *line == SIGNED_MESSAGE_BEGIN);
        let end = lines.iter().position(|line| *line == SIGNATURE_BEGIN);
        let signed = match (begin, end) {
            (Some(begin), Some(end)) if begin < end => &lines[begin + 1..end],
            (Some(_), Some(_)) => &[][..],
            _ => &lines[..],
        };
        Self {
            lines: signed.iter().map(|line| (*line).to_string()).collect(),
        }
    }

    /// Read and parse a manifest file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read checksum manifest {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// The digest listed for `file_name`.
    ///
    /// `None` when the file is not listed, or when it is listed more than once
    /// with different digests.
    pub fn digest_for(&self, file_name: &str) -> Option<&str> {
        let pattern =
            Regex::new(&format!(r"^([0-9a-fA-F]{{64}})[ ]+{}$", regex::escape(file_name))).ok()?;
        let mut digests = self
            .lines
            .iter()
            .filter_map(|line| pattern.captures(line))
            .filter_map(|caps| caps.get(1).map(|digest| digest.as_str()));

        let first = digests.next()?;
        digests.all(|digest| digest == first).then_some(first)
    }
}
