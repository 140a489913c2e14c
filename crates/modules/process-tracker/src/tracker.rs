use std::{collections::HashSet, path::Path};

use event_store::{
    WriteJob,
    jobs::{self, NewProcess},
};
use proc_snapshot::{Pid, ProcessSource, SnapshotError};

use crate::heuristic::{ClassificationPolicy, Verdict, should_track};

/// Follows application processes from their first appearance to their exit.
///
/// Each PID moves through `unseen -> open -> closed`: it becomes open when the
/// classification accepts it and closed once a listing no longer contains it.
/// Every transition is returned as a [`WriteJob`] for the caller to submit.
#[derive(Debug)]
pub struct LifecycleTracker {
    tracked: HashSet<Pid>,
    /// Rejected PIDs, so they are not classified again while they live.
    ignored: HashSet<Pid>,
    policy: ClassificationPolicy,
}

impl LifecycleTracker {
    pub fn new(policy: ClassificationPolicy) -> Self {
        Self {
            tracked: HashSet::new(),
            ignored: HashSet::new(),
            policy,
        }
    }

    /// Replaces the policy used for processes seen from now on. PIDs already
    /// rejected stay ignored until they exit.
    pub fn set_policy(&mut self, policy: ClassificationPolicy) {
        self.policy = policy;
    }

    pub fn tracked(&self) -> &HashSet<Pid> {
        &self.tracked
    }

    pub fn ignored(&self) -> &HashSet<Pid> {
        &self.ignored
    }

    /// Seeds the tracked set from records left open by a previous run.
    ///
    /// Live PIDs are adopted, the others are closed at `now`.
    pub fn reconcile<S>(&mut self, open_pids: &[i64], source: &S, now: i64) -> Vec<WriteJob>
    where
        S: ProcessSource + ?Sized,
    {
        let live: Option<HashSet<Pid>> = match source.pids() {
            Ok(pids) => Some(pids.into_iter().collect()),
            Err(err) => {
                log::warn!("Listing processes failed, checking open records one by one: {err}");
                None
            }
        };

        let mut jobs = Vec::new();
        for &raw in open_pids {
            let alive = i32::try_from(raw).ok().map(Pid::from_raw).filter(|pid| {
                live.as_ref()
                    .map_or_else(|| source.is_alive(*pid), |live| live.contains(pid))
            });

            match alive {
                Some(pid) => {
                    self.tracked.insert(pid);
                }
                None => {
                    log::debug!("Closing record of process {raw} ended while the agent was down");
                    jobs.push(jobs::close_process(raw, now));
                }
            }
        }

        log::info!(
            "Resumed tracking of {} processes, closed {} stale records",
            self.tracked.len(),
            jobs.len()
        );
        jobs
    }

    /// Compares a fresh listing with the tracked set.
    ///
    /// On a listing failure nothing changes and the error is returned.
    pub fn tick<S>(&mut self, source: &S, now: i64) -> Result<Vec<WriteJob>, SnapshotError>
    where
        S: ProcessSource + ?Sized,
    {
        let live: HashSet<Pid> = source.pids()?.into_iter().collect();
        let changes = proc_snapshot::diff(&self.tracked, &live);

        let mut jobs = Vec::with_capacity(changes.ended.len());
        for pid in changes.ended {
            log::debug!("Process {pid} ended");
            self.tracked.remove(&pid);
            jobs.push(jobs::close_process(pid.as_raw().into(), now));
        }

        for pid in changes.candidates {
            if self.ignored.contains(&pid) {
                continue;
            }
            let Some(process) = source.describe(pid) else {
                continue;
            };

            match should_track(&process, &self.policy) {
                Verdict::Accept => {
                    // Accepted processes always carry a name.
                    let name = process.name.as_deref().unwrap_or_default();
                    log::debug!("Tracking {name} (pid {pid})");
                    jobs.push(jobs::insert_process(&NewProcess {
                        name,
                        pid: pid.as_raw().into(),
                        parent_name: process.parent_name.as_deref(),
                        exe_path: process.exe_path.as_deref().and_then(Path::to_str),
                        start_time: now,
                    }));
                    self.tracked.insert(pid);
                }
                Verdict::Reject(reason) => {
                    log::trace!("Not tracking pid {pid}: {reason}");
                    self.ignored.insert(pid);
                }
            }
        }

        self.ignored.retain(|pid| live.contains(pid));

        Ok(jobs)
    }
}
