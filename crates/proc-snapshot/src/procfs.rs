//! Utility functions used to extract data from procfs

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use glob::glob;
use nix::unistd::{Pid, Uid};
use thiserror::Error;

/// `comm` holds at most this many characters, longer names are cut.
const COMM_MAX_LEN: usize = 15;

#[derive(Error, Debug)]
pub enum ProcfsError {
    #[error("reading {path} failed")]
    ReadFile {
        #[source]
        source: io::Error,
        path: String,
    },
    #[error("parent for process {0} not found")]
    ParentNotFound(Pid),
    #[error("user id for process {0} not found")]
    UserNotFound(Pid),
    #[error("globbing running processes")]
    GlobbingError(#[from] glob::PatternError),
    #[error("unreadable entry")]
    GlobError(#[from] glob::GlobError),
    #[error(transparent)]
    ParseIntError(#[from] std::num::ParseIntError),
}

impl ProcfsError {
    /// True when the error means the process does not exist (anymore).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcfsError::ReadFile { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Lists the PIDs of every process currently visible in `/proc`.
pub fn get_running_processes() -> Result<Vec<Pid>, ProcfsError> {
    let mut pids = Vec::new();
    for entry in glob("/proc/[0-9]*")? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<i32>().ok())
        else {
            continue;
        };
        pids.push(Pid::from_raw(pid));
    }
    Ok(pids)
}

/// Returns true while `/proc/<pid>` exists.
pub fn process_exists(pid: Pid) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Returns the path of the executable image of a given process.
pub fn get_process_image(pid: Pid) -> Result<PathBuf, ProcfsError> {
    let path = format!("/proc/{pid}/exe");
    fs::read_link(&path).map_err(|source| ProcfsError::ReadFile { source, path })
}

/// Returns the command line for the given process.
pub fn get_process_command_line(pid: Pid) -> Result<Vec<String>, ProcfsError> {
    let path = format!("/proc/{pid}/cmdline");
    let data = fs::read(&path).map_err(|source| ProcfsError::ReadFile { source, path })?;

    Ok(data
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect())
}

/// Returns the command name for the given process.
pub fn get_process_comm(pid: Pid) -> Result<String, ProcfsError> {
    let path = format!("/proc/{pid}/comm");
    let data = fs::read_to_string(&path).map_err(|source| ProcfsError::ReadFile { source, path })?;
    Ok(data.trim_end_matches('\n').to_owned())
}

/// Returns the name of a process as the user knows it.
///
/// This is `comm`, except when `comm` hit the kernel length limit: then the
/// basename of `argv[0]` is used if it extends the truncated value.
pub fn get_process_name(pid: Pid) -> Result<String, ProcfsError> {
    let comm = get_process_comm(pid)?;
    if comm.chars().count() < COMM_MAX_LEN {
        return Ok(comm);
    }

    let full_name = get_process_command_line(pid)
        .ok()
        .and_then(|argv| argv.into_iter().next())
        .and_then(|argv0| {
            Path::new(&argv0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .filter(|name| name.starts_with(&comm));

    Ok(full_name.unwrap_or(comm))
}

/// Returns the value of a `/proc/<pid>/status` field, without the key.
fn get_status_field(pid: Pid, field: &str) -> Result<Option<String>, ProcfsError> {
    let path = format!("/proc/{pid}/status");
    let file = File::open(&path).map_err(|source| ProcfsError::ReadFile { source, path })?;

    let prefix = format!("{field}:");
    let reader = BufReader::new(file);
    for line in reader.lines().map_while(Result::ok) {
        if let Some(value) = line.strip_prefix(&prefix) {
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

/// Returns the parent of a given process.
pub fn get_process_parent_pid(pid: Pid) -> Result<Pid, ProcfsError> {
    let value = get_status_field(pid, "PPid")?.ok_or(ProcfsError::ParentNotFound(pid))?;
    Ok(Pid::from_raw(value.parse()?))
}

/// Returns the real user id of a given process.
pub fn get_process_user_id(pid: Pid) -> Result<Uid, ProcfsError> {
    let value = get_status_field(pid, "Uid")?.ok_or(ProcfsError::UserNotFound(pid))?;
    let real = value
        .split_whitespace()
        .next()
        .ok_or(ProcfsError::UserNotFound(pid))?;
    Ok(Uid::from_raw(real.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_listed() {
        let me = Pid::this();
        assert!(get_running_processes().unwrap().contains(&me));
        assert!(process_exists(me));
    }

    #[test]
    fn current_process_attributes() {
        let me = Pid::this();
        assert!(!get_process_name(me).unwrap().is_empty());
        assert_eq!(get_process_parent_pid(me).unwrap(), Pid::parent());
        assert_eq!(get_process_user_id(me).unwrap(), nix::unistd::getuid());
        assert_eq!(
            get_process_image(me).unwrap(),
            std::env::current_exe().unwrap()
        );
    }

    #[test]
    fn missing_process_is_not_found() {
        // Above the kernel's pid_max upper bound.
        let ghost = Pid::from_raw(i32::MAX);
        assert!(!process_exists(ghost));
        assert!(get_process_comm(ghost).unwrap_err().is_not_found());
    }
}
