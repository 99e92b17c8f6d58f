//! Error handling for nodeup
//!
//! This module provides the error taxonomy of the updater and the user-friendly
//! error reporting used by the CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so the orchestrator can decide what is fatal
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Architecture
//!
//! - [`UpdaterError`] - Enumerated failure kinds of the update pipeline
//! - [`ErrorContext`] - Wrapper that adds suggestions and details for display
//!
//! Internal code returns [`anyhow::Result`] and attaches `.context(...)` the same
//! way everywhere; the typed [`UpdaterError`] travels inside the `anyhow::Error`
//! and is recovered with [`anyhow::Error::downcast_ref`] where the kind matters.
//!
//! # Error Kinds
//!
//! - **Network**: [`UpdaterError::RemoteUnavailable`]
//! - **Trust**: [`UpdaterError::VerificationFailed`]
//! - **Versions**: [`UpdaterError::VersionParseError`], [`UpdaterError::VersionMismatch`]
//! - **Installation**: [`UpdaterError::ExtractionFailed`], [`UpdaterError::SelfTestFailed`]
//! - **Platform**: [`UpdaterError::UnknownArchitecture`]
//! - **Processes**: [`UpdaterError::ProcessError`], [`UpdaterError::Timeout`],
//!   [`UpdaterError::Cancelled`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use nodeup_cli::core::{UpdaterError, user_friendly_error};
//!
//! let error = anyhow::Error::from(UpdaterError::UnknownArchitecture {
//!     machine: "sparc64".to_string(),
//! });
//! let context = user_friendly_error(error);
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for nodeup operations.
///
/// Every variant corresponds to one failure kind of the update pipeline. Most of
/// them abort the processing of the daemon they occur for; see the
/// `daemon` module for how the run as a whole reacts.
#[derive(Error, Debug, Clone)]
pub enum UpdaterError {
    /// A release index, API endpoint or file could not be retrieved.
    #[error("Cannot retrieve {url}: {reason}")]
    RemoteUnavailable {
        /// The URL that failed
        url: String,
        /// Transport or HTTP failure description
        reason: String,
    },

    /// Signature or checksum verification failed after the single retry.
    ///
    /// The release must not be installed.
    #[error("Verification of {subject} failed: {reason}")]
    VerificationFailed {
        /// What was being verified (manifest, archive, key)
        subject: String,
        /// Why verification failed
        reason: String,
    },

    /// A binary or RPC answer reported a version in an unexpected format.
    ///
    /// Always fatal: a silent misparse could install or keep running the wrong version.
    #[error("Cannot parse version reported by {source_name}: {output:?}")]
    VersionParseError {
        /// The command or field that produced the output
        source_name: String,
        /// The offending output
        output: String,
    },

    /// Freshly extracted binaries do not report the version that was downloaded.
    #[error("Downloaded binaries report version {found}, expected {expected}")]
    VersionMismatch {
        /// Version that was verified and extracted
        expected: String,
        /// Version the extracted binaries reported
        found: String,
    },

    /// Extracting an archive into its versioned directory failed.
    #[error("Failed to extract {archive}: {reason}")]
    ExtractionFailed {
        /// Path to the archive
        archive: String,
        /// Underlying archive or filesystem error
        reason: String,
    },

    /// The machine's instruction set has no release build.
    #[error("Unknown architecture {machine}")]
    UnknownArchitecture {
        /// Value of `uname -m`
        machine: String,
    },

    /// The embedded test suite of a release exited with a non-zero status.
    #[error("Self test failed with exit status {code}")]
    SelfTestFailed {
        /// Exit status of the test binary, propagated as the process exit status
        code: i32,
    },

    /// A bounded wait expired before the expected state was reached.
    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// The configured maximum duration
        seconds: u64,
    },

    /// A wait was interrupted by the user.
    #[error("Interrupted while waiting for {operation}")]
    Cancelled {
        /// What was being waited for
        operation: String,
    },

    /// Starting, stopping or signalling a daemon failed.
    #[error("Process operation '{operation}' failed: {reason}")]
    ProcessError {
        /// The operation (start, stop, signal)
        operation: String,
        /// Why it failed
        reason: String,
    },

    /// A required external tool is not installed.
    #[error("Required tool '{tool}' not found in PATH")]
    ToolNotFound {
        /// Name of the missing executable
        tool: String,
    },

    /// Configuration file problem.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl UpdaterError {
    /// Whether this error must terminate the whole run even in continue-on-error mode.
    #[must_use]
    pub const fn aborts_run(&self) -> bool {
        matches!(self, Self::SelfTestFailed { .. } | Self::Cancelled { .. })
    }
}

/// Error wrapper carrying operator-facing suggestions.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Find the typed [`UpdaterError`] anywhere in an error chain.
#[must_use]
pub fn find_updater_error(error: &anyhow::Error) -> Option<&UpdaterError> {
    error.chain().find_map(|cause| cause.downcast_ref::<UpdaterError>())
}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// [`UpdaterError`] kinds get tailored suggestions; everything else is shown
/// with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    let context = ErrorContext::new(message);
    let Some(kind) = find_updater_error(&error) else {
        return context;
    };

    match kind {
        UpdaterError::RemoteUnavailable { .. } => context
            .with_suggestion("Check your network connection and try again later")
            .with_details("Release indexes are fetched from bitcoin.org and api.github.com"),
        UpdaterError::VerificationFailed { .. } => context
            .with_suggestion(
                "Do not install this release manually. Re-run later; if the failure persists, \
                 compare the signing key fingerprint with the project's published one",
            )
            .with_details("Nothing was installed and the current version is still active"),
        UpdaterError::VersionParseError { .. } | UpdaterError::VersionMismatch { .. } => context
            .with_suggestion("Run the binary with --version and report the output")
            .with_details("The current link was not changed"),
        UpdaterError::ExtractionFailed { .. } => context
            .with_suggestion("Check free disk space and permissions of the installation root")
            .with_details("The previous installation is still active"),
        UpdaterError::UnknownArchitecture { .. } => context
            .with_suggestion("Install this daemon manually; no release build matches this machine"),
        UpdaterError::SelfTestFailed { .. } => context
            .with_suggestion("Re-run with -s to skip the tests, at your own risk"),
        UpdaterError::Timeout { .. } => context.with_suggestion(
            "Inspect the daemon's log; raise the timeouts in the [polling] configuration \
             section if it is just slow",
        ),
        UpdaterError::Cancelled { .. } => context,
        UpdaterError::ProcessError { .. } => {
            context.with_suggestion("Check the daemon's configuration and log file")
        }
        UpdaterError::ToolNotFound { tool } => context
            .with_suggestion(format!("Install {tool} with your system package manager")),
        UpdaterError::ConfigError { .. } => {
            context.with_suggestion("Check the syntax of ~/.nodeup/config.toml")
        }
    }
}
