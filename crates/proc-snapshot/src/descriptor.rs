use std::path::PathBuf;

use nix::unistd::Pid;

/// Windows mandatory integrity level of a process token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegrityLevel {
    Untrusted,
    Low,
    Medium,
    High,
    System,
    Protected,
}

impl IntegrityLevel {
    /// Maps a mandatory label RID to its level, rounding down between levels.
    pub fn from_rid(rid: u32) -> Self {
        match rid {
            0x0000..0x1000 => IntegrityLevel::Untrusted,
            0x1000..0x2000 => IntegrityLevel::Low,
            0x2000..0x3000 => IntegrityLevel::Medium,
            0x3000..0x4000 => IntegrityLevel::High,
            0x4000..0x5000 => IntegrityLevel::System,
            _ => IntegrityLevel::Protected,
        }
    }
}

/// Identity a process runs as, in the terms of its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Real user id on Unix systems.
    Uid(u32),
    /// Token integrity level on Windows.
    Integrity(IntegrityLevel),
}

/// Platform independent view of a live process.
///
/// Every attribute is optional: a process may exit, or deny access, between
/// the listing and the moment its attributes are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    pub name: Option<String>,
    pub parent_pid: Option<Pid>,
    pub parent_name: Option<String>,
    pub exe_path: Option<PathBuf>,
    pub principal: Option<Principal>,
    /// Whether the process owns a visible top-level window. Only window
    /// systems with a per-process answer fill it in, procfs leaves it `None`.
    pub window_visible: Option<bool>,
}

impl ProcessDescriptor {
    /// Descriptor with only a pid and a name, everything else unknown.
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: Some(name.into()),
            parent_pid: None,
            parent_name: None,
            exe_path: None,
            principal: None,
            window_visible: None,
        }
    }

    pub fn with_parent(mut self, parent_pid: Pid, parent_name: impl Into<String>) -> Self {
        self.parent_pid = Some(parent_pid);
        self.parent_name = Some(parent_name.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_window_visible(mut self, visible: bool) -> Self {
        self.window_visible = Some(visible);
        self
    }

    pub fn with_exe_path(mut self, exe_path: impl Into<PathBuf>) -> Self {
        self.exe_path = Some(exe_path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_from_rid() {
        assert_eq!(IntegrityLevel::from_rid(0x0000), IntegrityLevel::Untrusted);
        assert_eq!(IntegrityLevel::from_rid(0x1000), IntegrityLevel::Low);
        assert_eq!(IntegrityLevel::from_rid(0x2100), IntegrityLevel::Medium);
        assert_eq!(IntegrityLevel::from_rid(0x3000), IntegrityLevel::High);
        assert_eq!(IntegrityLevel::from_rid(0x4000), IntegrityLevel::System);
        assert_eq!(IntegrityLevel::from_rid(0x5000), IntegrityLevel::Protected);
        assert!(IntegrityLevel::Protected > IntegrityLevel::System);
    }
}
