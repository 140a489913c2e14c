use std::collections::HashSet;

use proc_snapshot::{Pid, ProcessKiller, ProcessSource, SnapshotError};

/// Outcome of one pass over the process table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub killed: Vec<(Pid, String)>,
    pub failed: Vec<(Pid, String)>,
}

/// Kills every live process whose name is in `blocked`, ignoring case.
///
/// `self_pid` is never killed. A failed kill is logged and the sweep goes on.
pub fn sweep<S, K>(
    blocked: &[String],
    source: &S,
    killer: &K,
    self_pid: Pid,
) -> Result<SweepReport, SnapshotError>
where
    S: ProcessSource + ?Sized,
    K: ProcessKiller + ?Sized,
{
    let mut report = SweepReport::default();
    if blocked.is_empty() {
        return Ok(report);
    }
    let blocked: HashSet<String> = blocked.iter().map(|name| name.to_lowercase()).collect();

    for pid in source.pids()? {
        if pid == self_pid {
            continue;
        }
        let Some(name) = source.name(pid) else {
            continue;
        };
        if !blocked.contains(&name.to_lowercase()) {
            continue;
        }

        match killer.kill(pid) {
            Ok(()) => {
                log::info!("killed blocked process {name} (pid {pid})");
                report.killed.push((pid, name));
            }
            Err(err) => {
                log::warn!("failed to kill {name} (pid {pid}): {err}");
                report.failed.push((pid, name));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use proc_snapshot::{KillError, ProcessDescriptor};

    use super::*;

    struct FakeSource(Vec<(i32, &'static str)>);

    impl ProcessSource for FakeSource {
        fn pids(&self) -> Result<Vec<Pid>, SnapshotError> {
            Ok(self.0.iter().map(|(pid, _)| Pid::from_raw(*pid)).collect())
        }

        fn describe(&self, pid: Pid) -> Option<ProcessDescriptor> {
            self.name(pid).map(|name| ProcessDescriptor::new(pid, name))
        }

        fn name(&self, pid: Pid) -> Option<String> {
            self.0
                .iter()
                .find(|(raw, _)| *raw == pid.as_raw())
                .map(|(_, name)| name.to_string())
        }

        fn is_alive(&self, pid: Pid) -> bool {
            self.name(pid).is_some()
        }
    }

    #[derive(Default)]
    struct FakeKiller {
        killed: Mutex<Vec<Pid>>,
        refuse: Option<i32>,
    }

    impl ProcessKiller for FakeKiller {
        fn kill(&self, pid: Pid) -> Result<(), KillError> {
            if self.refuse == Some(pid.as_raw()) {
                return Err(KillError {
                    pid,
                    source: nix::errno::Errno::EPERM,
                });
            }
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    fn blocked(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn matches_ignore_case() {
        let source = FakeSource(vec![(10, "chrome.exe"), (11, "code"), (12, "STEAM")]);
        let killer = FakeKiller::default();

        let report = sweep(
            &blocked(&["Chrome.exe", "steam"]),
            &source,
            &killer,
            Pid::from_raw(1),
        )
        .unwrap();

        assert_eq!(
            *killer.killed.lock().unwrap(),
            vec![Pid::from_raw(10), Pid::from_raw(12)]
        );
        assert_eq!(report.killed.len(), 2);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn never_kills_itself() {
        let source = FakeSource(vec![(1, "procguard"), (2, "procguard")]);
        let killer = FakeKiller::default();

        sweep(&blocked(&["procguard"]), &source, &killer, Pid::from_raw(1)).unwrap();
        assert_eq!(*killer.killed.lock().unwrap(), vec![Pid::from_raw(2)]);
    }

    #[test]
    fn failure_does_not_abort_the_sweep() {
        let source = FakeSource(vec![(10, "steam"), (11, "steam")]);
        let killer = FakeKiller {
            refuse: Some(10),
            ..Default::default()
        };

        let report = sweep(&blocked(&["steam"]), &source, &killer, Pid::from_raw(1)).unwrap();
        assert_eq!(report.failed, vec![(Pid::from_raw(10), "steam".to_string())]);
        assert_eq!(report.killed, vec![(Pid::from_raw(11), "steam".to_string())]);
    }

    #[test]
    fn empty_list_is_a_noop() {
        struct Unlistable;

        impl ProcessSource for Unlistable {
            fn pids(&self) -> Result<Vec<Pid>, SnapshotError> {
                Err(SnapshotError::Unavailable("should not be listed".into()))
            }
            fn describe(&self, _pid: Pid) -> Option<ProcessDescriptor> {
                None
            }
            fn name(&self, _pid: Pid) -> Option<String> {
                None
            }
            fn is_alive(&self, _pid: Pid) -> bool {
                false
            }
        }

        let report = sweep(&[], &Unlistable, &FakeKiller::default(), Pid::from_raw(1)).unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
