//! Version identifiers of daemon releases.
//!
//! Versions come from three places that each format them differently:
//!
//! - the Bitcoin Core download index (`bitcoin-core-0.21.0/`)
//! - lnd release tags on GitHub (`v0.17.0-beta`, sometimes without a patch segment)
//! - the first line of `<binary> --version` and the clients' RPC answers
//!
//! All of them are normalized into [`Version`], which orders dotted segments
//! numerically (`0.21.0 > 0.9.0`) instead of lexically.
//!
//! # Examples
//!
//! ```rust
//! use nodeup_cli::version::{Version, lnd_tag_to_version};
//!
//! let a: Version = "0.21.0".parse().unwrap();
//! let b: Version = "0.9.0".parse().unwrap();
//! assert!(a > b);
//!
//! let lnd = lnd_tag_to_version("v0.10-beta").unwrap();
//! assert_eq!(lnd.to_string(), "0.10.0-beta");
//! ```

pub mod release;

use anyhow::Result;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::core::UpdaterError;
use crate::utils::ToolCommand;

pub use release::{latest_bitcoin_core, latest_lnd, resolve_latest};

/// First line of `bitcoind --version`.
pub static BITCOIND_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Bitcoin Core (?:Daemon )?version v(.*)$").expect("static regex")
});

/// First line of `bitcoin-cli --version`.
pub static BITCOIN_CLI_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Bitcoin Core RPC client version v(.*)$").expect("static regex"));

/// First line of `lnd --version`.
pub static LND_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^lnd version .* commit=v(.*)$").expect("static regex"));

static LND_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v([0-9.]*)-(.*)$").expect("static regex"));

/// A release version: dotted numeric segments plus an optional `-suffix`.
///
/// Segments compare numerically, left to right, with missing segments counting
/// as zero (`22.0 == 22.0.0`); then the suffix, where a missing suffix sorts
/// first. Display keeps the segments as they were written.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    suffix: Option<String>,
}

impl Version {
    /// Numeric segments in order.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// The part after the first `-`, if any.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Segments without trailing zeros.
    fn significant(&self) -> &[u64] {
        let len = self.segments.iter().rposition(|segment| *segment != 0).map_or(0, |i| i + 1);
        &self.segments[..len]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant()
            .cmp(other.significant())
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
        self.suffix.hash(state);
    }
}

impl FromStr for Version {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UpdaterError::VersionParseError {
            source_name: "version identifier".to_string(),
            output: s.to_string(),
        };

        let (numbers, suffix) = match s.split_once('-') {
            Some((numbers, suffix)) if !suffix.is_empty() => (numbers, Some(suffix.to_string())),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };
        if numbers.is_empty() {
            return Err(invalid());
        }

        let segments = numbers
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            segments,
            suffix,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

/// Normalize an lnd release tag (`v0.10-beta`) into a version (`0.10.0-beta`).
///
/// A missing patch segment is filled in with `.0` so the result compares equal
/// to what `lnd --version` reports for the same release.
pub fn lnd_tag_to_version(tag: &str) -> Result<Version, UpdaterError> {
    let caps = LND_TAG.captures(tag).ok_or_else(|| UpdaterError::VersionParseError {
        source_name: "lnd release tag".to_string(),
        output: tag.to_string(),
    })?;

    let mut numbers = caps[1].to_string();
    if numbers.matches('.').count() < 2 {
        numbers.push_str(".0");
    }
    format!("{numbers}-{}", &caps[2]).parse()
}

/// Parse `text` with `pattern` and read its first capture group as a [`Version`].
///
/// `source_name` names the command or RPC field in the error.
pub fn capture_version(
    pattern: &Regex,
    text: &str,
    source_name: &str,
) -> Result<Version, UpdaterError> {
    let parse_error = || UpdaterError::VersionParseError {
        source_name: source_name.to_string(),
        output: text.to_string(),
    };
    let caps = pattern.captures(text).ok_or_else(parse_error)?;
    let raw = caps.get(1).ok_or_else(parse_error)?.as_str();
    raw.parse().map_err(|_| parse_error())
}

/// Version reported by `<binary> --version`, or `None` if the binary does not exist.
///
/// Only the first output line is matched against `pattern`. A non-zero exit
/// status or an unmatched line is a [`UpdaterError::VersionParseError`].
pub async fn installed_version(binary: &Path, pattern: &Regex) -> Result<Option<Version>> {
    if !binary.exists() {
        tracing::debug!("{} is not installed", binary.display());
        return Ok(None);
    }

    let source_name = format!("{} --version", binary.display());
    let output =
        ToolCommand::new(binary).arg("--version").with_context("version probe").execute().await?;
    if !output.success() {
        return Err(UpdaterError::VersionParseError {
            source_name,
            output: output.stderr.trim().to_string(),
        }
        .into());
    }

    let first_line = output.stdout.lines().next().unwrap_or_default();
    let version = capture_version(pattern, first_line, &source_name)?;
    tracing::debug!("{} reports version {}", binary.display(), version);
    Ok(Some(version))
}
