//! Global constants used throughout the nodeup codebase.
//!
//! This module contains polling intervals, timeouts, layout names and other
//! values that are shared by several modules. Defining them centrally keeps
//! magic numbers discoverable.

use std::time::Duration;

/// Name of the symlink that selects the active installation.
pub const LINK_NAME: &str = "current";

/// Interval between two probes of a polling loop (300 ms).
///
/// Used while waiting for a stopped daemon to leave the process table and
/// while waiting for a started daemon to answer RPC calls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

/// Maximum time to wait for every instance of a daemon to exit (120 seconds).
///
/// `bitcoind` flushes its chainstate on shutdown, which can take well over a
/// minute on slow disks.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum time to wait for a freshly started daemon to answer (300 seconds).
///
/// A restarted `bitcoind` rejects RPC calls while it loads its block index.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout applied to client RPC invocations and `--version` probes.
pub const TOOL_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to `gpg` invocations (key server lookups can be slow).
pub const GPG_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Connect timeout for HTTP requests.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of `/proc/<pid>/comm` (`TASK_COMM_LEN` minus the NUL byte).
pub const MAX_COMM_LEN: usize = 15;

/// Width of a column in the status table.
pub const COLUMN_WIDTH: usize = 14;

/// User agent sent with every HTTP request (GitHub's API rejects requests without one).
pub const USER_AGENT: &str = concat!("nodeup/", env!("CARGO_PKG_VERSION"));

/// Name of the advisory lock file placed in each installation root.
pub const INSTALL_LOCK_NAME: &str = ".nodeup.lock";
