//! Snapshots of the host process table.
//!
//! [`ProcessSource`] lists live PIDs and describes them through a
//! [`ProcessDescriptor`]; [`diff`] compares a listing with the set of PIDs a
//! consumer already knows about. [`ProcessKiller`] terminates processes.

mod descriptor;
mod differ;
pub mod procfs;
mod source;

pub use descriptor::{IntegrityLevel, Principal, ProcessDescriptor};
pub use differ::{SnapshotDiff, diff};
pub use nix::unistd::Pid;
pub use source::{
    KillError, ProcessKiller, ProcessSource, ProcfsSource, SignalKiller, SnapshotError,
};
