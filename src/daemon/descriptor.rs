//! Static description of each supported daemon family.

use std::fmt;

/// The daemon families nodeup knows how to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaemonKind {
    /// `bitcoind` / `bitcoin-cli`, released on bitcoin.org
    BitcoinCore,
    /// `lnd` / `lncli`, released on GitHub
    Lnd,
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitcoinCore => f.write_str("Bitcoin Core"),
            Self::Lnd => f.write_str("lnd"),
        }
    }
}

/// Where a daemon's releases come from and how they are signed.
///
/// Patterns contain `{version}` (the release label: a version for Bitcoin Core,
/// the release tag for lnd) and, for archives, `{arch}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonDescriptor {
    /// Family, selecting the release lookup and installation layout
    pub kind: DaemonKind,
    /// OS command name of the daemon process
    pub name: String,
    /// Client binary used for `stop` and version queries
    pub client: String,
    /// Fingerprint of the release signing key
    pub key_id: String,
    /// Where the armored signing key is published
    pub key_url: String,
    /// Checksum manifest file name
    pub manifest_pattern: String,
    /// Base URL of a release's files, ending in `/`
    pub release_root_pattern: String,
    /// Release archive file name
    pub archive_pattern: String,
    /// Release index: the download listing (Bitcoin Core) or the latest-release API (lnd)
    pub index_url: String,
}

impl DaemonDescriptor {
    /// Bitcoin Core as published on bitcoin.org.
    pub fn bitcoin_core() -> Self {
        Self {
            kind: DaemonKind::BitcoinCore,
            name: "bitcoind".to_string(),
            client: "bitcoin-cli".to_string(),
            key_id: "01EA5486DE18A882D4C2684590C8019E36C2E964".to_string(),
            key_url: "https://bitcoin.org/laanwj-releases.asc".to_string(),
            manifest_pattern: "SHA256SUMS.asc".to_string(),
            release_root_pattern: "https://bitcoin.org/bin/bitcoin-core-{version}/".to_string(),
            archive_pattern: "bitcoin-{version}-{arch}.tar.gz".to_string(),
            index_url: "https://bitcoin.org/bin/".to_string(),
        }
    }

    /// lnd as published on GitHub.
    pub fn lnd() -> Self {
        Self {
            kind: DaemonKind::Lnd,
            name: "lnd".to_string(),
            client: "lncli".to_string(),
            key_id: "F8037E70C12C7A263C032508CE58F7F8E20FD9A2".to_string(),
            key_url: "https://keybase.io/roasbeef/pgp_keys.asc".to_string(),
            manifest_pattern: "manifest-{version}.txt".to_string(),
            release_root_pattern:
                "https://github.com/lightningnetwork/lnd/releases/download/{version}/".to_string(),
            archive_pattern: "lnd-linux-{arch}-{version}.tar.gz".to_string(),
            index_url: "https://api.github.com/repos/lightningnetwork/lnd/releases/latest"
                .to_string(),
        }
    }

    /// Point every URL at `base` instead of the public hosts.
    ///
    /// The paths below `base` mirror the public layout: `bin/` for Bitcoin Core
    /// and `releases/...` for lnd.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        match self.kind {
            DaemonKind::BitcoinCore => {
                self.key_url = format!("{base}/laanwj-releases.asc");
                self.release_root_pattern = format!("{base}/bin/bitcoin-core-{{version}}/");
                self.index_url = format!("{base}/bin/");
            }
            DaemonKind::Lnd => {
                self.key_url = format!("{base}/pgp_keys.asc");
                self.release_root_pattern = format!("{base}/releases/download/{{version}}/");
                self.index_url = format!("{base}/releases/latest");
            }
        }
        self
    }

    /// Checksum manifest file name for a release.
    pub fn manifest_name(&self, label: &str) -> String {
        self.manifest_pattern.replace("{version}", label)
    }

    /// Base URL of a release's files.
    pub fn release_root(&self, label: &str) -> String {
        self.release_root_pattern.replace("{version}", label)
    }

    /// Archive file name of a release for an architecture.
    pub fn archive_name(&self, label: &str, arch: &str) -> String {
        self.archive_pattern.replace("{version}", label).replace("{arch}", arch)
    }

    /// Name of the versioned installation directory of a release.
    pub fn install_dir_name(&self, label: &str, arch: &str) -> String {
        match self.kind {
            DaemonKind::BitcoinCore => format!("bitcoin-{label}"),
            DaemonKind::Lnd => format!("lnd-linux-{arch}-{label}"),
        }
    }
}
