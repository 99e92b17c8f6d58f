//! Discovery of the latest published release.

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

use super::{Version, lnd_tag_to_version};
use crate::core::UpdaterError;
use crate::daemon::{DaemonDescriptor, DaemonKind};
use crate::fetch::Fetcher;

static BITCOIN_INDEX_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a href="bitcoin-core-([0-9.]*)/">.*</a>"#).expect("static regex")
});

/// The newest release of a daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Normalized version, comparable with what the binaries report
    pub version: Version,
    /// Identifier used in release URLs and file names (`0.21.0`, `v0.17.0-beta`)
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Latest Bitcoin Core release with a published checksum manifest.
///
/// Directories appear in the download index before their files are uploaded,
/// so candidates are tried newest first until one has a non-empty manifest.
pub async fn latest_bitcoin_core(
    fetcher: &Fetcher,
    descriptor: &DaemonDescriptor,
) -> Result<Release> {
    let index = fetcher.get_text(&descriptor.index_url).await?;

    let mut candidates: Vec<(Version, String)> = BITCOIN_INDEX_ENTRY
        .captures_iter(&index)
        .filter_map(|caps| {
            let label = caps[1].to_string();
            label.parse::<Version>().ok().map(|version| (version, label))
        })
        .collect();
    candidates.sort_by(|a, b| b.cmp(a));
    candidates.dedup_by(|a, b| a.0 == b.0);
    debug!("{} candidate Bitcoin Core releases in the index", candidates.len());

    for (version, label) in candidates {
        let url =
            format!("{}{}", descriptor.release_root(&label), descriptor.manifest_name(&label));
        match fetcher.probe_size(&url).await {
            Some(size) if size > 0 => {
                debug!("Bitcoin Core {} is published", version);
                return Ok(Release {
                    version,
                    label,
                });
            }
            _ => debug!("Bitcoin Core {} has no manifest yet", version),
        }
    }

    Err(UpdaterError::RemoteUnavailable {
        url: descriptor.index_url.clone(),
        reason: "no release with a published checksum manifest".to_string(),
    }
    .into())
}

/// Latest lnd release according to the GitHub releases API.
pub async fn latest_lnd(fetcher: &Fetcher, descriptor: &DaemonDescriptor) -> Result<Release> {
    let latest: LatestRelease = fetcher.get_json(&descriptor.index_url).await?;
    let version = lnd_tag_to_version(&latest.tag_name)?;
    debug!("Latest lnd release is {} ({})", version, latest.tag_name);
    Ok(Release {
        version,
        label: latest.tag_name,
    })
}

/// Latest release of whichever family `descriptor` describes.
pub async fn resolve_latest(fetcher: &Fetcher, descriptor: &DaemonDescriptor) -> Result<Release> {
    match descriptor.kind {
        DaemonKind::BitcoinCore => latest_bitcoin_core(fetcher, descriptor).await,
        DaemonKind::Lnd => latest_lnd(fetcher, descriptor).await,
    }
}
