use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use thiserror::Error;

use crate::{
    Principal, ProcessDescriptor,
    procfs::{self, ProcfsError},
};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("listing running processes failed")]
    Listing(#[from] ProcfsError),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
#[error("sending SIGKILL to process {pid} failed")]
pub struct KillError {
    pub pid: Pid,
    #[source]
    pub source: Errno,
}

/// Read access to the live process table.
pub trait ProcessSource: Send + Sync {
    /// Lists every live PID.
    fn pids(&self) -> Result<Vec<Pid>, SnapshotError>;

    /// Reads the attributes of `pid`, `None` when the process vanished.
    fn describe(&self, pid: Pid) -> Option<ProcessDescriptor>;

    /// Reads only the name of `pid`.
    fn name(&self, pid: Pid) -> Option<String>;

    fn is_alive(&self, pid: Pid) -> bool;
}

/// Forced termination of processes.
pub trait ProcessKiller: Send + Sync {
    fn kill(&self, pid: Pid) -> Result<(), KillError>;
}

/// [`ProcessSource`] backed by `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsSource;

impl ProcessSource for ProcfsSource {
    fn pids(&self) -> Result<Vec<Pid>, SnapshotError> {
        Ok(procfs::get_running_processes()?)
    }

    fn describe(&self, pid: Pid) -> Option<ProcessDescriptor> {
        let name = match procfs::get_process_name(pid) {
            Ok(name) => Some(name).filter(|name| !name.is_empty()),
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                log::trace!("Name of process {pid} unreadable: {err}");
                None
            }
        };

        let parent_pid = procfs::get_process_parent_pid(pid)
            .ok()
            .filter(|ppid| ppid.as_raw() > 0);
        let parent_name = parent_pid.and_then(|ppid| procfs::get_process_name(ppid).ok());
        let exe_path = procfs::get_process_image(pid).ok();
        let principal = procfs::get_process_user_id(pid)
            .ok()
            .map(|uid| Principal::Uid(uid.as_raw()));

        if !procfs::process_exists(pid) {
            return None;
        }

        Some(ProcessDescriptor {
            pid,
            name,
            parent_pid,
            parent_name,
            exe_path,
            principal,
            window_visible: None,
        })
    }

    fn name(&self, pid: Pid) -> Option<String> {
        procfs::get_process_name(pid).ok()
    }

    fn is_alive(&self, pid: Pid) -> bool {
        procfs::process_exists(pid)
    }
}

/// [`ProcessKiller`] sending `SIGKILL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalKiller;

impl ProcessKiller for SignalKiller {
    fn kill(&self, pid: Pid) -> Result<(), KillError> {
        signal::kill(pid, Signal::SIGKILL).map_err(|source| KillError { pid, source })
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn describe_current_process() {
        let me = Pid::this();
        let descriptor = ProcfsSource.describe(me).unwrap();
        assert_eq!(descriptor.pid, me);
        assert!(descriptor.name.is_some());
        assert_eq!(descriptor.parent_pid, Some(Pid::parent()));
        assert_eq!(
            descriptor.principal,
            Some(Principal::Uid(nix::unistd::getuid().as_raw()))
        );
        assert_eq!(descriptor.window_visible, None);
    }

    #[test]
    fn vanished_process_has_no_descriptor() {
        let ghost = Pid::from_raw(i32::MAX);
        assert!(ProcfsSource.describe(ghost).is_none());
        assert!(!ProcfsSource.is_alive(ghost));
    }

    #[test]
    fn kill_child_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        assert_eq!(ProcfsSource.name(pid).as_deref(), Some("sleep"));
        SignalKiller.kill(pid).unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn kill_missing_process_fails() {
        let err = SignalKiller.kill(Pid::from_raw(i32::MAX)).unwrap_err();
        assert_eq!(err.source, Errno::ESRCH);
    }
}
