//! Unpacking release archives into their versioned directories.

use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::core::UpdaterError;

/// Extract the gzipped tarball `archive` into a fresh `target_dir`.
///
/// Whatever exists at `target_dir` is removed first, so files of a running
/// daemon are unlinked rather than overwritten in place. Release archives keep
/// everything below one top-level directory, which is stripped: members without
/// a directory prefix are skipped, as is the top-level directory itself.
///
/// On failure the target is left absent or partial and
/// [`UpdaterError::ExtractionFailed`] is returned.
pub async fn extract_archive(archive: &Path, target_dir: &Path) -> Result<()> {
    let archive_path = archive.to_path_buf();
    let target = target_dir.to_path_buf();

    let result = tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &target))
        .await
        .context("Extraction task failed")?;

    result.map_err(|e| {
        UpdaterError::ExtractionFailed {
            archive: archive.display().to_string(),
            reason: format!("{e:#}"),
        }
        .into()
    })
}

fn extract_blocking(archive: &Path, target_dir: &Path) -> Result<()> {
    remove_existing(target_dir)?;
    fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;
    let root = target_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", target_dir.display()))?;

    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0usize;
    for entry in tar.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        let member = entry.path().context("Invalid member path")?.into_owned();
        let Some(relative) = strip_first_component(&member)? else {
            continue;
        };

        let dest = root.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
            // a symlink member extracted earlier must not redirect later members
            let resolved = parent.canonicalize()?;
            if !resolved.starts_with(&root) {
                bail!("Member {} escapes the target directory", member.display());
            }
        }

        entry.unpack(&dest).with_context(|| format!("Failed to unpack {}", member.display()))?;
        count += 1;
    }

    debug!("Extracted {} members of {} into {}", count, archive.display(), target_dir.display());
    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if metadata.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    removed.with_context(|| format!("Failed to remove {}", path.display()))
}

/// Member path below the top-level directory.
///
/// `None` for members to skip (no directory prefix, or the top-level directory
/// itself); an error for members that would leave the target.
fn strip_first_component(member: &Path) -> Result<Option<PathBuf>> {
    let mut components = member.components();
    match components.next() {
        Some(Component::Normal(_)) => {}
        Some(Component::CurDir) => return strip_first_component(components.as_path()),
        _ => return Err(anyhow!("Unsafe member path {}", member.display())),
    }

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => bail!("Unsafe member path {}", member.display()),
        }
    }

    if relative.as_os_str().is_empty() {
        // a bare file name or the top-level directory
        return Ok(None);
    }
    Ok(Some(relative))
}
