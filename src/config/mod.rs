//! Configuration of the filesystem layout and timing.
//!
//! nodeup works without any configuration file: every path defaults to the
//! layout below the user's home directory.
//!
//! | Setting        | Default                       | Purpose                                 |
//! |----------------|-------------------------------|-----------------------------------------|
//! | `cache_dir`    | `~/tars`                      | Downloaded archives, manifests, signatures |
//! | `bin_dir`      | `~/bin`                       | Links to the installed binaries         |
//! | `man_dir`      | `~/.local/share/man/man1`     | Links to the installed man pages        |
//! | `bitcoin_root` | `~/opt/bitcoin`               | Bitcoin Core installations, per arch    |
//! | `lnd_root`     | `~/opt/lnd`                   | lnd installations                       |
//! | `gpg`          | `gpg`                         | Trust tool executable                   |
//!
//! The file is read from `--config`, `$NODEUP_CONFIG`, or `~/.nodeup/config.toml`:
//!
//! ```toml
//! cache_dir = "~/downloads/nodes"
//! bin_dir = "/usr/local/bin"
//!
//! [polling]
//! interval_ms = 500
//! stop_timeout_secs = 300
//! start_timeout_secs = 600
//! ```
//!
//! `~` refers to the configured `home` (the user's home directory by default);
//! relative paths are taken relative to it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_START_TIMEOUT, DEFAULT_STOP_TIMEOUT};
use crate::core::UpdaterError;
use crate::process::PollPolicy;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "NODEUP_CONFIG";

/// The configuration file as written by the user; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base for `~` and relative paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    /// Download cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    /// Directory receiving binary links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<String>,
    /// Directory receiving man page links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub man_dir: Option<String>,
    /// Bitcoin Core install root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoin_root: Option<String>,
    /// lnd install root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lnd_root: Option<String>,
    /// gpg executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg: Option<String>,
    /// Wait loop tuning
    #[serde(default)]
    pub polling: PollingSection,
}

/// `[polling]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingSection {
    /// Pause between probes in milliseconds
    pub interval_ms: Option<u64>,
    /// Maximum wait for a daemon to exit, in seconds
    pub stop_timeout_secs: Option<u64>,
    /// Maximum wait for a daemon to start answering, in seconds
    pub start_timeout_secs: Option<u64>,
}

/// Resolved configuration passed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Base directory of the default layout
    pub home: PathBuf,
    /// Download cache; never cleaned
    pub cache_dir: PathBuf,
    /// Directory receiving binary links
    pub bin_dir: PathBuf,
    /// Directory receiving man page links
    pub man_dir: PathBuf,
    /// Bitcoin Core install root (one subdirectory per architecture)
    pub bitcoin_root: PathBuf,
    /// lnd install root
    pub lnd_root: PathBuf,
    /// gpg executable
    pub gpg: PathBuf,
    /// Pause between probes of every wait loop
    pub poll_interval: Duration,
    /// Maximum wait for a daemon to exit
    pub stop_timeout: Duration,
    /// Maximum wait for a daemon to start answering
    pub start_timeout: Duration,
}

impl UpdaterConfig {
    /// The default layout below `home`.
    pub fn for_home(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            cache_dir: home.join("tars"),
            bin_dir: home.join("bin"),
            man_dir: home.join(".local/share/man/man1"),
            bitcoin_root: home.join("opt/bitcoin"),
            lnd_root: home.join("opt/lnd"),
            gpg: PathBuf::from("gpg"),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }

    /// Apply a configuration file on top of the defaults.
    pub fn resolve(file: ConfigFile) -> Result<Self> {
        let home = match &file.home {
            Some(home) => PathBuf::from(shellexpand::tilde(home).as_ref()),
            None => dirs::home_dir().ok_or_else(|| UpdaterError::ConfigError {
                message: "cannot determine the home directory; set `home`".to_string(),
            })?,
        };

        let mut config = Self::for_home(&home);
        let expand = |value: &str| {
            let home_str = home.to_string_lossy();
            let expanded = shellexpand::tilde_with_context(value, || Some(home_str.as_ref()));
            let path = PathBuf::from(expanded.as_ref());
            if path.is_absolute() { path } else { home.join(path) }
        };

        if let Some(value) = &file.cache_dir {
            config.cache_dir = expand(value);
        }
        if let Some(value) = &file.bin_dir {
            config.bin_dir = expand(value);
        }
        if let Some(value) = &file.man_dir {
            config.man_dir = expand(value);
        }
        if let Some(value) = &file.bitcoin_root {
            config.bitcoin_root = expand(value);
        }
        if let Some(value) = &file.lnd_root {
            config.lnd_root = expand(value);
        }
        if let Some(value) = &file.gpg {
            // a bare name is looked up in PATH
            config.gpg =
                if value.contains('/') { expand(value) } else { PathBuf::from(value) };
        }

        let polling = &file.polling;
        if let Some(ms) = polling.interval_ms {
            if ms == 0 {
                return Err(UpdaterError::ConfigError {
                    message: "polling.interval_ms must be greater than zero".to_string(),
                }
                .into());
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = polling.stop_timeout_secs {
            config.stop_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = polling.start_timeout_secs {
            config.start_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// `~/.nodeup/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| UpdaterError::ConfigError {
            message: "cannot determine the home directory".to_string(),
        })?;
        Ok(home.join(".nodeup").join("config.toml"))
    }

    /// Load from an explicit path, or from the default location.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(&path).await;
        }
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Self::resolve(ConfigFile::default())
        }
    }

    /// Load and resolve a configuration file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| UpdaterError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::resolve(file)
    }

    /// Wait policy for daemons shutting down.
    pub fn stop_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.stop_timeout)
    }

    /// Wait policy for daemons starting up.
    pub fn start_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.start_timeout)
    }

    /// Create the download cache directory.
    pub async fn ensure_cache_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))
    }
}
