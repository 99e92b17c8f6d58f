//! [`TrustStore`] backed by the `gpg` command line tool.

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::TrustStore;
use crate::constants::GPG_COMMAND_TIMEOUT;
use crate::core::UpdaterError;
use crate::utils::{ToolCommand, ToolOutput};

/// Options passed to every gpg invocation.
///
/// `--trust-model always` accepts any key in the keyring, so trust is decided
/// solely by which fingerprints nodeup imports.
const BASE_ARGS: [&str; 5] = ["--batch", "--logger-fd", "1", "--trust-model", "always"];

/// Runs `gpg` in batch mode against the user's default keyring.
#[derive(Debug, Clone)]
pub struct GpgTrustStore {
    program: PathBuf,
}

impl GpgTrustStore {
    /// Use the given gpg executable (a name looked up in PATH, or a path).
    ///
    /// Fails with [`UpdaterError::ToolNotFound`] when it cannot be found.
    pub fn new(program: impl Into<PathBuf>) -> Result<Self> {
        let program = program.into();
        if which::which(&program).is_err() {
            return Err(UpdaterError::ToolNotFound {
                tool: program.display().to_string(),
            }
            .into());
        }
        Ok(Self {
            program,
        })
    }

    async fn run<I, S>(&self, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        ToolCommand::new(&self.program)
            .args(BASE_ARGS)
            .args(args)
            .with_timeout(Some(GPG_COMMAND_TIMEOUT))
            .with_context("gpg")
            .execute()
            .await
    }
}

impl TrustStore for GpgTrustStore {
    async fn has_key(&self, key_id: &str) -> Result<bool> {
        Ok(self.run(["-k", key_id]).await?.success())
    }

    async fn import_key_from_url(&self, url: &str) -> Result<bool> {
        Ok(self.run(["--fetch-keys", url]).await?.success())
    }

    async fn import_key_from_server(&self, key_id: &str) -> Result<bool> {
        Ok(self.run(["--recv-keys", key_id]).await?.success())
    }

    async fn verify_detached(&self, signature: &Path, data: Option<&Path>) -> Result<bool> {
        let mut args: Vec<OsString> = vec!["--verify".into(), signature.into()];
        if let Some(data) = data.filter(|data| *data != signature) {
            args.push(data.into());
        }
        let output = self.run(args).await?;
        if !output.success() {
            tracing::debug!("gpg rejected {}: {}", signature.display(), output.stdout.trim());
        }
        Ok(output.success())
    }
}
