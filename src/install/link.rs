//! Atomic symlink management.
//!
//! The `current` link of an install root and the per-file links in the bin and
//! man directories are only ever replaced by renaming a freshly created
//! symlink over them, so no observer sees a missing or half-written link.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Make `link` a symlink to `target`.
///
/// Does nothing when `link` already points at `target`; otherwise a temporary
/// sibling symlink is renamed over `link`, which also covers a missing `link`.
/// Returns whether the link changed.
pub async fn switch_link(target: &Path, link: &Path) -> Result<bool> {
    match fs::read_link(link).await {
        Ok(existing) if existing == target => return Ok(false),
        Ok(_) => {}
        Err(_) => {
            if fs::metadata(link).await.is_ok_and(|metadata| metadata.is_dir()) {
                bail!("{} is a directory, not a link", link.display());
            }
        }
    }

    let file_name = link
        .file_name()
        .with_context(|| format!("Invalid link path {}", link.display()))?
        .to_string_lossy();
    let temp_link = link.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));
    if fs::symlink_metadata(&temp_link).await.is_ok() {
        fs::remove_file(&temp_link).await?;
    }

    fs::symlink(target, &temp_link)
        .await
        .with_context(|| format!("Failed to create link {}", temp_link.display()))?;
    if let Err(e) = fs::rename(&temp_link, link).await {
        let _ = fs::remove_file(&temp_link).await;
        return Err(e).with_context(|| format!("Failed to replace {}", link.display()));
    }

    debug!("{} -> {}", link.display(), target.display());
    Ok(true)
}

/// Link every entry of `source_dir` into `dest_dir` under the same name.
///
/// `dest_dir` is created if needed. Returns the number of links that changed.
pub async fn refresh_links(source_dir: &Path, dest_dir: &Path) -> Result<usize> {
    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let mut names = Vec::new();
    let mut entries = fs::read_dir(source_dir)
        .await
        .with_context(|| format!("Failed to list {}", source_dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }
    names.sort();

    let mut changed = 0;
    for name in names {
        if switch_link(&source_dir.join(&name), &dest_dir.join(&name)).await? {
            changed += 1;
        }
    }
    Ok(changed)
}

/// Flush all pending writes to stable storage.
pub async fn sync_filesystem() -> Result<()> {
    tokio::task::spawn_blocking(nix::unistd::sync).await.context("sync task failed")?;
    Ok(())
}
