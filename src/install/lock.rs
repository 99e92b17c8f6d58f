//! Advisory lock serializing installations into one install root.
//!
//! Two nodeup runs (say, a cron job and an operator) must not extract into
//! the same versioned directory or race on its `current` link. The lock is
//! held from verification until the links are refreshed and is released when
//! the [`InstallLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::INSTALL_LOCK_NAME;

/// An exclusive lock on an install root.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Lock `install_root`, waiting for any other holder to finish.
    ///
    /// The root is created if it does not exist yet.
    pub async fn acquire(install_root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(install_root)
            .await
            .with_context(|| format!("Failed to create directory {}", install_root.display()))?;

        let path = install_root.join(INSTALL_LOCK_NAME);
        let lock_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        debug!("Acquired install lock {}", path.display());
        Ok(Self {
            file,
            path,
        })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
