//! Integration test suite for nodeup
//!
//! End-to-end runs of the update pipeline against a local release server, a
//! fake keyring and scripted "binaries", plus argument handling of the
//! `nodeup` executable.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **bitcoin**: Bitcoin Core upgrades, self tests, verification failures
//! - **lnd**: lnd upgrades and the locked-wallet state
//! - **run**: multi-daemon runs and continue-on-error
//! - **cli**: the `nodeup` binary's arguments, configuration and exit status

#[path = "../common/mod.rs"]
mod common;

mod bitcoin;
mod cli;
mod lnd;
mod run;
