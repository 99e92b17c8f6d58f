//! HTTP(S) retrieval of release indexes and release files.
//!
//! File downloads go straight into the cache directory and can be resumed with
//! a byte-range request. Download failures are logged and reported as `false`
//! instead of being raised: the verifier decides whether a missing or short file
//! matters, because a stale cached copy may still verify.
//!
//! Index lookups ([`Fetcher::get_text`], [`Fetcher::get_json`]) are different:
//! without the index there is nothing to decide, so they fail with
//! [`UpdaterError::RemoteUnavailable`].

use anyhow::{Context, Result};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::constants::{HTTP_CONNECT_TIMEOUT, USER_AGENT};
use crate::core::UpdaterError;
use crate::utils::progress::DownloadProgress;

/// HTTP client shared by every remote operation of a run.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    show_progress: bool,
}

impl Fetcher {
    /// Build a client that identifies itself with the nodeup user agent.
    ///
    /// GitHub's REST API rejects requests without one.
    pub fn new(show_progress: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Size of the remote file according to a `HEAD` request.
    ///
    /// `None` when the request fails, the status is not a success, or the
    /// server sends no usable `Content-Length`.
    pub async fn probe_size(&self, url: &str) -> Option<u64> {
        let response = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("HEAD {} answered {}", url, response.status());
            return None;
        }
        // content_length() reports the (empty) body of a HEAD response, not the header
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Download `url` into `local_path`.
    ///
    /// With `resume`, an existing local file is compared with the remote size:
    /// equal means nothing to do, smaller means the rest is requested with a
    /// `Range` header and appended. Everything else, including a server that
    /// ignores the range, rewrites the file from scratch.
    ///
    /// Returns whether the download succeeded; failures are logged.
    pub async fn fetch(&self, url: &str, local_path: &Path, resume: bool) -> bool {
        match self.try_fetch(url, local_path, resume).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Download of {} failed: {:#}", url, e);
                false
            }
        }
    }

    async fn try_fetch(&self, url: &str, local_path: &Path, resume: bool) -> Result<()> {
        let mut offset = 0;
        if resume {
            let local_size = fs::metadata(local_path)
                .await
                .ok()
                .filter(std::fs::Metadata::is_file)
                .map(|metadata| metadata.len());
            if let Some(local_size) = local_size {
                match self.probe_size(url).await {
                    Some(remote_size) if remote_size == local_size => {
                        debug!("{} is already complete", local_path.display());
                        return Ok(());
                    }
                    Some(remote_size) if local_size < remote_size => offset = local_size,
                    _ => {}
                }
            }
        }

        let mut request = self.client.get(url);
        if offset > 0 {
            debug!("Resuming {} at byte {}", url, offset);
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = request.send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::RemoteUnavailable {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            }
            .into());
        }

        let append = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        if offset > 0 && !append {
            debug!("Server ignored the range request for {}, downloading in full", url);
            offset = 0;
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut file = if append {
            OpenOptions::new().append(true).open(local_path).await
        } else {
            fs::File::create(local_path).await
        }
        .with_context(|| format!("Failed to open {}", local_path.display()))?;

        let label = local_path
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        let total = response.content_length().map(|len| len + offset);
        let progress = self.show_progress.then(|| DownloadProgress::new(&label, total, offset));

        while let Some(chunk) = response.chunk().await.with_context(|| format!("Reading {url}"))? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", local_path.display()))?;
            if let Some(progress) = &progress {
                progress.inc(chunk.len() as u64);
            }
        }
        file.flush().await?;
        if let Some(progress) = progress {
            progress.finish();
        }

        debug!("Saved {} to {}", url, local_path.display());
        Ok(())
    }

    /// Body of `url` as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let unavailable = |reason: String| UpdaterError::RemoteUnavailable {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}")).into());
        }
        Ok(response.text().await.map_err(|e| unavailable(e.to_string()))?)
    }

    /// Body of `url` deserialized from JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            UpdaterError::RemoteUnavailable {
                url: url.to_string(),
                reason: format!("invalid JSON: {e}"),
            }
            .into()
        })
    }
}
