//! Crash-safe installation of verified releases.
//!
//! A release is extracted into its own versioned directory next to the
//! `current` link. Only after its binaries have been checked and the filesystem
//! has been synced is `current` switched atomically, followed by the links in
//! the shared bin and man directories, which point through `current`.

pub mod extract;
pub mod link;
pub mod lock;

pub use extract::extract_archive;
pub use link::{refresh_links, switch_link, sync_filesystem};
pub use lock::InstallLock;
