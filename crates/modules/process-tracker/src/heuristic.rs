use std::fmt;

use proc_snapshot::{IntegrityLevel, Pid, Principal, ProcessDescriptor};

use crate::ignore::IgnoreList;

pub const DEFAULT_MIN_USER_UID: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    NoName,
    SelfProcess,
    SameNameAsParent,
    SystemPrincipal,
    Ignored,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::NoName => "name unreadable",
            RejectReason::SelfProcess => "agent process",
            RejectReason::SameNameAsParent => "same name as parent",
            RejectReason::SystemPrincipal => "system principal",
            RejectReason::Ignored => "ignore list",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// Inputs of [`should_track`] that do not come from the process itself.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    pub self_pid: Pid,
    /// Unix uids below this value belong to system accounts.
    pub min_user_uid: u32,
    pub ignore: IgnoreList,
}

/// Decides whether a process is an application worth recording.
///
/// Rules apply in order and the first match wins. Threads of one application
/// show up as children sharing its name, so only the first of them counts.
/// Window visibility is not consulted: background applications are recorded
/// like windowed ones.
pub fn should_track(process: &ProcessDescriptor, policy: &ClassificationPolicy) -> Verdict {
    let Some(name) = process.name.as_deref().filter(|name| !name.is_empty()) else {
        return Verdict::Reject(RejectReason::NoName);
    };

    if process.pid == policy.self_pid {
        return Verdict::Reject(RejectReason::SelfProcess);
    }

    let parent_name = process.parent_name.as_deref();
    if parent_name == Some(name) {
        return Verdict::Reject(RejectReason::SameNameAsParent);
    }

    let system = match process.principal {
        Some(Principal::Uid(uid)) => uid < policy.min_user_uid,
        Some(Principal::Integrity(level)) => level >= IntegrityLevel::System,
        None => false,
    };
    if system {
        return Verdict::Reject(RejectReason::SystemPrincipal);
    }

    if policy.ignore.is_ignored(name) || parent_name.is_some_and(|p| policy.ignore.is_ignored(p))
    {
        return Verdict::Reject(RejectReason::Ignored);
    }

    Verdict::Accept
}

#[cfg(test)]
mod tests {
    use procguard_core::platform::Platform;

    use super::*;

    fn policy() -> ClassificationPolicy {
        ClassificationPolicy {
            self_pid: Pid::from_raw(42),
            min_user_uid: DEFAULT_MIN_USER_UID,
            ignore: IgnoreList::for_platform(Platform::Linux),
        }
    }

    fn user_process(pid: i32, name: &str) -> ProcessDescriptor {
        ProcessDescriptor::new(Pid::from_raw(pid), name)
            .with_parent(Pid::from_raw(1), "bash")
            .with_principal(Principal::Uid(1000))
    }

    #[test]
    fn user_application_is_accepted() {
        assert_eq!(
            should_track(&user_process(100, "firefox"), &policy()),
            Verdict::Accept
        );
    }

    #[test]
    fn unreadable_or_empty_name() {
        let mut process = user_process(100, "");
        assert_eq!(
            should_track(&process, &policy()),
            Verdict::Reject(RejectReason::NoName)
        );
        process.name = None;
        assert_eq!(
            should_track(&process, &policy()),
            Verdict::Reject(RejectReason::NoName)
        );
    }

    #[test]
    fn agent_itself() {
        assert_eq!(
            should_track(&user_process(42, "procguard"), &policy()),
            Verdict::Reject(RejectReason::SelfProcess)
        );
    }

    #[test]
    fn child_with_parent_name() {
        let process = ProcessDescriptor::new(Pid::from_raw(101), "chrome")
            .with_parent(Pid::from_raw(100), "chrome")
            .with_principal(Principal::Uid(1000));
        assert_eq!(
            should_track(&process, &policy()),
            Verdict::Reject(RejectReason::SameNameAsParent)
        );
    }

    #[test]
    fn system_principals() {
        let root = ProcessDescriptor::new(Pid::from_raw(7), "cron").with_principal(Principal::Uid(0));
        assert_eq!(
            should_track(&root, &policy()),
            Verdict::Reject(RejectReason::SystemPrincipal)
        );

        let service = ProcessDescriptor::new(Pid::from_raw(8), "updater.exe")
            .with_principal(Principal::Integrity(IntegrityLevel::System));
        assert_eq!(
            should_track(&service, &policy()),
            Verdict::Reject(RejectReason::SystemPrincipal)
        );

        let elevated = ProcessDescriptor::new(Pid::from_raw(9), "setup.exe")
            .with_principal(Principal::Integrity(IntegrityLevel::High));
        assert_eq!(should_track(&elevated, &policy()), Verdict::Accept);
    }

    #[test]
    fn window_visibility_does_not_decide() {
        let hidden = user_process(15, "syncthing").with_window_visible(false);
        assert_eq!(should_track(&hidden, &policy()), Verdict::Accept);

        let shown = ProcessDescriptor::new(Pid::from_raw(16), "explorer.exe")
            .with_principal(Principal::Integrity(IntegrityLevel::System))
            .with_window_visible(true);
        assert_eq!(
            should_track(&shown, &policy()),
            Verdict::Reject(RejectReason::SystemPrincipal)
        );
    }

    #[test]
    fn unknown_principal_passes() {
        let process = ProcessDescriptor::new(Pid::from_raw(10), "game");
        assert_eq!(should_track(&process, &policy()), Verdict::Accept);
    }

    #[test]
    fn ignore_list_matches_name_and_parent() {
        assert_eq!(
            should_track(&user_process(11, "gsd-color"), &policy()),
            Verdict::Reject(RejectReason::Ignored)
        );
        assert_eq!(
            should_track(&user_process(12, ".gsd-colo"), &policy()),
            Verdict::Reject(RejectReason::Ignored)
        );

        let child = ProcessDescriptor::new(Pid::from_raw(13), "sh")
            .with_parent(Pid::from_raw(12), "xdg-desktop-portal")
            .with_principal(Principal::Uid(1000));
        assert_eq!(
            should_track(&child, &policy()),
            Verdict::Reject(RejectReason::Ignored)
        );
    }

    #[test]
    fn rules_apply_in_order() {
        // Ignored and owned by root: the principal rule comes first.
        let process = ProcessDescriptor::new(Pid::from_raw(14), "pipewire")
            .with_principal(Principal::Uid(0));
        assert_eq!(
            should_track(&process, &policy()),
            Verdict::Reject(RejectReason::SystemPrincipal)
        );
    }

    #[test]
    fn verdict_is_deterministic() {
        let process = user_process(15, "code");
        let policy = policy();
        let first = should_track(&process, &policy);
        assert!((0..10).all(|_| should_track(&process, &policy) == first));
    }
}
