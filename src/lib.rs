//! nodeup - secure, idempotent updater for bitcoind and lnd
//!
//! nodeup keeps a Bitcoin Core node and an lnd node on their latest releases.
//! A release is only installed after its archive has been matched against a
//! checksum manifest signed by the project's release key, and it only becomes
//! active through an atomic switch of a `current` symlink, so a crash at any
//! point leaves the previous installation usable.
//!
//! # Layout
//!
//! ```text
//! ~/tars/                                   download cache (never cleaned)
//! ~/opt/bitcoin/<gcc-arch>/bitcoin-0.21.0/  one directory per release
//! ~/opt/bitcoin/<gcc-arch>/current -> bitcoin-0.21.0
//! ~/opt/lnd/lnd-linux-amd64-v0.17.0-beta/
//! ~/opt/lnd/current -> lnd-linux-amd64-v0.17.0-beta
//! ~/bin/bitcoind -> ~/opt/bitcoin/<gcc-arch>/current/bin/bitcoind
//! ~/.local/share/man/man1/bitcoind.1 -> .../current/share/man/man1/bitcoind.1
//! ```
//!
//! # Modules
//!
//! Leaf-first:
//! - [`version`] - version parsing, ordering and latest-release discovery
//! - [`trust`] - signature checks delegated to `gpg`
//! - [`fetch`] - resumable HTTP downloads and index lookups
//! - [`verify`] - signed manifest and checksum verification of archives
//! - [`install`] - extraction, durability barrier, atomic link switching
//! - [`process`] - finding, stopping and starting daemons with bounded waits
//! - [`daemon`] - the per-family update pipeline and multi-daemon runs
//! - [`cli`] - argument parsing and the status table
//!
//! Supporting: [`config`], [`constants`], [`core`] (errors) and [`utils`].

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

pub mod fetch;
pub mod trust;
pub mod verify;
pub mod version;

pub mod daemon;
pub mod install;
pub mod process;

pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
