//! Mapping the machine's instruction set onto release architecture labels.
//!
//! Bitcoin Core names its builds after GCC target triples, lnd after Go's
//! `GOARCH` values.

use anyhow::{Context, Result};
use nix::sys::utsname::uname;

use crate::core::UpdaterError;

/// The machine hardware name, as printed by `uname -m`.
pub fn machine() -> Result<String> {
    let uts = uname().context("uname failed")?;
    Ok(uts.machine().to_string_lossy().into_owned())
}

/// GCC target triple for Bitcoin Core archives.
pub fn gcc_arch(machine: &str) -> String {
    if machine.contains("arm") {
        "arm-linux-gnueabihf".to_string()
    } else if machine == "i686" {
        "i686-pc-linux-gnu".to_string()
    } else {
        format!("{machine}-linux-gnu")
    }
}

/// Go architecture for lnd archives.
pub fn go_arch(machine: &str) -> Result<String, UpdaterError> {
    let arch = match machine {
        "i686" => "386",
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        m if m.starts_with("arm") => "arm",
        _ => {
            return Err(UpdaterError::UnknownArchitecture {
                machine: machine.to_string(),
            });
        }
    };
    Ok(arch.to_string())
}
