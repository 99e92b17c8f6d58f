//! Verification of release archives.
//!
//! An archive is trusted only through this chain:
//!
//! 1. the checksum manifest carries a valid signature by the daemon's release key
//! 2. the manifest lists exactly one digest for the archive's file name
//! 3. the archive's SHA-256 equals that digest
//!
//! Cached files are tried first; each failing link is re-downloaded and checked
//! exactly once more before giving up with
//! [`UpdaterError::VerificationFailed`]. A cached archive that fails is first
//! completed with a ranged request, since it may be the head of an interrupted
//! download, and only then fetched again in full. Nothing about a successful
//! verification is remembered between runs.

pub mod checksum;
pub mod manifest;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::UpdaterError;
use crate::daemon::DaemonDescriptor;
use crate::fetch::Fetcher;
use crate::trust::{TrustStore, ensure_key};

pub use manifest::ChecksumManifest;

/// A release archive for one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    /// File name, identical remotely and in the cache
    pub file_name: String,
    /// Download URL
    pub url: String,
    /// Location in the cache directory
    pub local_path: PathBuf,
}

impl ArchiveArtifact {
    /// Locate the archive of release `label` for `arch`.
    pub fn new(descriptor: &DaemonDescriptor, label: &str, arch: &str, cache_dir: &Path) -> Self {
        let file_name = descriptor.archive_name(label, arch);
        Self {
            url: format!("{}{}", descriptor.release_root(label), file_name),
            local_path: cache_dir.join(&file_name),
            file_name,
        }
    }
}

/// Cache file name of a manifest: the release label is appended to the stem
/// unless the name already ends with it, so manifests of different releases
/// can share the cache directory.
pub fn local_manifest_name(manifest_name: &str, label: &str) -> String {
    let (stem, extension) = match manifest_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (manifest_name, None),
    };
    let stem = if stem.ends_with(&format!("-{label}")) {
        stem.to_string()
    } else {
        format!("{stem}-{label}")
    };
    match extension {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem,
    }
}

/// Runs the verification chain for release archives.
pub struct ArtifactVerifier<'a, T: TrustStore> {
    fetcher: &'a Fetcher,
    trust: &'a T,
    cache_dir: &'a Path,
}

impl<'a, T: TrustStore> ArtifactVerifier<'a, T> {
    /// Create a verifier downloading into `cache_dir`.
    pub fn new(fetcher: &'a Fetcher, trust: &'a T, cache_dir: &'a Path) -> Self {
        Self {
            fetcher,
            trust,
            cache_dir,
        }
    }

    /// Verify the archive of release `label` for `arch` and return its cached path.
    pub async fn verify(
        &self,
        descriptor: &DaemonDescriptor,
        label: &str,
        arch: &str,
    ) -> Result<PathBuf> {
        let manifest = self.verified_manifest(descriptor, label).await?;

        let artifact = ArchiveArtifact::new(descriptor, label, arch, self.cache_dir);
        let digest = manifest.digest_for(&artifact.file_name).ok_or_else(|| {
            UpdaterError::VerificationFailed {
                subject: artifact.file_name.clone(),
                reason: "the manifest lists no single trusted digest for it".to_string(),
            }
        })?;

        if !checksum::file_matches(&artifact.local_path, digest).await {
            // a cached file may be the head of an interrupted download
            let partial = tokio::fs::metadata(&artifact.local_path).await.is_ok();
            info!("Downloading {}", artifact.file_name);
            self.fetcher.fetch(&artifact.url, &artifact.local_path, partial).await;
            let mut matches = checksum::file_matches(&artifact.local_path, digest).await;
            if !matches && partial {
                debug!("{} still does not match, downloading it again", artifact.file_name);
                self.fetcher.fetch(&artifact.url, &artifact.local_path, false).await;
                matches = checksum::file_matches(&artifact.local_path, digest).await;
            }
            if !matches {
                return Err(UpdaterError::VerificationFailed {
                    subject: artifact.file_name,
                    reason: "SHA-256 digest does not match the signed manifest".to_string(),
                }
                .into());
            }
        }

        debug!("{} matches its signed digest", artifact.file_name);
        Ok(artifact.local_path)
    }

    /// Load the manifest of release `label` after checking its signature.
    async fn verified_manifest(
        &self,
        descriptor: &DaemonDescriptor,
        label: &str,
    ) -> Result<ChecksumManifest> {
        let manifest_name = descriptor.manifest_name(label);
        let local_manifest = self.cache_dir.join(local_manifest_name(&manifest_name, label));
        // clearsigned manifests carry their own signature
        let postfix = if manifest_name.ends_with(".asc") { "" } else { ".sig" };
        let signature = PathBuf::from(format!("{}{}", local_manifest.display(), postfix));

        if !self.trust.verify_detached(&signature, Some(&local_manifest)).await? {
            info!("Fetching signed checksums {}", manifest_name);
            ensure_key(self.trust, &descriptor.key_id, &descriptor.key_url).await?;

            let root = descriptor.release_root(label);
            self.fetcher.fetch(&format!("{root}{manifest_name}{postfix}"), &signature, false).await;
            if !postfix.is_empty() {
                self.fetcher.fetch(&format!("{root}{manifest_name}"), &local_manifest, false).await;
            }

            if !self.trust.verify_detached(&signature, Some(&local_manifest)).await? {
                return Err(UpdaterError::VerificationFailed {
                    subject: manifest_name,
                    reason: format!("no valid signature by key {}", descriptor.key_id),
                }
                .into());
            }
        }

        debug!("Signature of {} is valid", manifest_name);
        ChecksumManifest::load(&local_manifest).await
    }
}
