//! Command-line interface for nodeup.
//!
//! nodeup has no subcommands: one invocation reconciles bitcoind, lnd, or both,
//! then prints a status table.
//!
//! # Examples
//!
//! ```bash
//! nodeup                      # update bitcoind and lnd, run the self tests
//! nodeup -l -r                # only lnd, restart it if it runs an old version
//! nodeup -b -s                # only bitcoind, skip test_bitcoin
//! nodeup --continue-on-error  # keep going when one daemon fails
//! ```
//!
//! # Exit Status
//!
//! - `0` when every daemon was reconciled
//! - the exit status of `test_bitcoin` when the self test fails
//! - `1` for any other failure

pub mod report;

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::daemon::{DaemonDescriptor, ReconcileOptions, Reconciler};
use crate::fetch::Fetcher;
use crate::trust::GpgTrustStore;

/// Installs the latest verified releases of bitcoind and lnd.
#[derive(Parser, Debug)]
#[command(
    name = "nodeup",
    about = "Installs the latest version of bitcoind/lnd",
    version,
    long_about = "nodeup downloads the latest Bitcoin Core and lnd releases, verifies their \
                  signed checksums, installs them side by side and switches the active \
                  version atomically."
)]
pub struct Cli {
    /// Process only bitcoind
    #[arg(short = 'b', long = "bitcoind-only", conflicts_with = "lnd_only")]
    bitcoind_only: bool,

    /// Process only lnd
    #[arg(short = 'l', long = "lnd-only")]
    lnd_only: bool,

    /// Skip the self tests bundled with a release
    #[arg(short = 's', long = "skip-tests")]
    skip_tests: bool,

    /// Restart the daemons if they do not run the installed version
    #[arg(short = 'r', long)]
    restart: bool,

    /// Report a failing daemon and continue with the next one
    ///
    /// The exit status is 1 if any daemon failed. A failed self test or an
    /// interrupt still ends the run immediately.
    #[arg(long)]
    continue_on_error: bool,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Show errors only
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (default: ~/.nodeup/config.toml)
    #[arg(long, env = crate::config::CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Disable download progress bars
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    /// Log level used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// Install the global tracing subscriber, writing to stderr.
    pub fn init_logging(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.log_level()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Daemons selected by `-b` / `-l`, in processing order.
    pub fn descriptors(&self) -> Vec<DaemonDescriptor> {
        let mut descriptors = Vec::new();
        if !self.lnd_only {
            descriptors.push(DaemonDescriptor::bitcoin_core());
        }
        if !self.bitcoind_only {
            descriptors.push(DaemonDescriptor::lnd());
        }
        descriptors
    }

    /// Pipeline switches selected by `-r` / `-s`.
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            restart: self.restart,
            run_tests: !self.skip_tests,
        }
    }

    /// Run the update and print the status table.
    ///
    /// Waits for daemons end early once `cancel` fires.
    pub async fn execute(self, cancel: CancellationToken) -> Result<()> {
        let config = UpdaterConfig::load_with_optional(self.config.clone()).await?;
        debug!("Using configuration {:?}", config);
        config.ensure_cache_dir().await?;

        let fetcher = Fetcher::new(!self.no_progress)?;
        let trust = GpgTrustStore::new(&config.gpg)?;
        let reconciler = Reconciler::new(config, fetcher, trust, cancel)?;

        let descriptors = self.descriptors();
        let report = reconciler.run(&descriptors, self.options(), self.continue_on_error).await?;
        report::print_table(&report);

        if report.has_failures() {
            let failed = report.failed_names();
            bail!(
                "{} of {} daemons failed: {}",
                failed.len(),
                descriptors.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}
