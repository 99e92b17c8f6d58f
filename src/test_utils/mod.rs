//! Test utilities for nodeup
//!
//! Shared by the unit tests and the integration suite (through the `test-utils`
//! feature):
//!
//! - [`TestHttpServer`] - a local HTTP server with `HEAD` and byte-range support
//! - [`TarballBuilder`] - release archives built on the fly
//! - [`FakeTrustStore`] - an in-memory [`crate::trust::TrustStore`]
//!
//! # Example
//!
//! ```rust,no_run
//! use nodeup_cli::test_utils::{TarballBuilder, TestHttpServer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = TestHttpServer::start().await?;
//! let archive = TarballBuilder::new("bitcoin-0.21.0")
//!     .executable("bin/bitcoind", "echo 'Bitcoin Core version v0.21.0'")
//!     .build()?;
//! server.serve("/bin/bitcoin-core-0.21.0/bitcoin-0.21.0-x86_64-linux-gnu.tar.gz", archive);
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod http;
pub mod trust;

pub use fixtures::{TarballBuilder, script, sha256_hex, write_script};
pub use http::TestHttpServer;
pub use trust::{FakeTrustStore, VerifyPolicy};

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests once per process.
///
/// `RUST_LOG` is respected; without it only warnings are shown.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
