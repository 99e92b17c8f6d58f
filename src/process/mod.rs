//! Locating and controlling daemon processes.
//!
//! Daemons are identified only by their OS command name as the process table
//! reports it; no PID files are written or trusted. Several processes may share
//! a name, so lookups return a [`ProcessSet`].

pub mod poll;
pub mod supervisor;

use std::collections::BTreeSet;
use sysinfo::{
    Pid, PidExt, Process, ProcessExt, ProcessRefreshKind, ProcessStatus, System, SystemExt,
};

use crate::constants::MAX_COMM_LEN;

pub use poll::PollPolicy;
pub use supervisor::Supervisor;

/// PIDs of all processes with a given command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSet {
    pids: BTreeSet<i32>,
}

impl ProcessSet {
    /// Whether no matching process exists.
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Number of matching processes.
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    /// Whether `pid` is in the set.
    pub fn contains(&self, pid: i32) -> bool {
        self.pids.contains(&pid)
    }

    /// PIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.pids.iter().copied()
    }
}

impl FromIterator<i32> for ProcessSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Self {
            pids: iter.into_iter().collect(),
        }
    }
}

/// The name the kernel reports for a command: the first 15 bytes.
pub fn comm_name(name: &str) -> &str {
    let mut end = name.len().min(MAX_COMM_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// A process table snapshot with names and states only.
fn process_table() -> System {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessRefreshKind::new());
    system
}

fn is_live(process: &Process) -> bool {
    process.status() != ProcessStatus::Zombie
}

/// Command name of process `pid` unless it is absent or a zombie.
pub fn live_comm(pid: i32) -> Option<String> {
    let pid = Pid::from_u32(u32::try_from(pid).ok()?);
    let mut system = System::new();
    if !system.refresh_process_specifics(pid, ProcessRefreshKind::new()) {
        return None;
    }
    let process = system.process(pid).filter(|process| is_live(process))?;
    Some(comm_name(process.name()).to_string())
}

/// All live processes whose command name is `name`.
///
/// Zombies are left out: they have exited and only wait to be reaped.
pub fn find_processes(name: &str) -> ProcessSet {
    let expected = comm_name(name);
    process_table()
        .processes()
        .iter()
        .filter(|(_, process)| is_live(process) && comm_name(process.name()) == expected)
        .filter_map(|(pid, _)| i32::try_from(pid.as_u32()).ok())
        .collect()
}
