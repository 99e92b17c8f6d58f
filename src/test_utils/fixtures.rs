//! Release archive and executable fixtures.

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Body of a `/bin/sh` script with the given commands.
pub fn script(body: &str) -> String {
    format!("#!/bin/sh\n{body}\n")
}

/// Write an executable shell script `dir/name` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, script(body))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

struct Entry {
    path: String,
    contents: Vec<u8>,
    mode: u32,
}

/// Builds a `.tar.gz` whose members live below one top-level directory, the
/// way release archives are laid out.
pub struct TarballBuilder {
    root: String,
    entries: Vec<Entry>,
    root_level: Vec<Entry>,
}

impl TarballBuilder {
    /// Start an archive whose top-level directory is `root`.
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            entries: Vec::new(),
            root_level: Vec::new(),
        }
    }

    /// Add a regular file at `root/path`.
    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.entries.push(Entry {
            path: path.to_string(),
            contents: contents.into(),
            mode: 0o644,
        });
        self
    }

    /// Add an executable shell script at `root/path`.
    pub fn executable(mut self, path: &str, body: &str) -> Self {
        self.entries.push(Entry {
            path: path.to_string(),
            contents: script(body).into_bytes(),
            mode: 0o755,
        });
        self
    }

    /// Add a member with no directory prefix at all.
    pub fn root_level_file(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.root_level.push(Entry {
            path: name.to_string(),
            contents: contents.into(),
            mode: 0o644,
        });
        self
    }

    /// Produce the gzip-compressed archive bytes.
    pub fn build(self) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_mode(0o755);
        dir.set_size(0);
        builder.append_data(&mut dir, format!("{}/", self.root), std::io::empty())?;

        let prefixed =
            self.entries.iter().map(|entry| (format!("{}/{}", self.root, entry.path), entry));
        let bare = self.root_level.iter().map(|entry| (entry.path.clone(), entry));
        for (path, entry) in prefixed.chain(bare) {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(entry.mode);
            header.set_size(entry.contents.len() as u64);
            builder.append_data(&mut header, path, entry.contents.as_slice())?;
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}
