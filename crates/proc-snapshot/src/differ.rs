use std::collections::HashSet;

use nix::unistd::Pid;

/// Result of comparing the tracked PIDs with a fresh listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Tracked PIDs missing from the listing, ascending.
    pub ended: Vec<Pid>,
    /// Listed PIDs not tracked yet, ascending.
    pub candidates: Vec<Pid>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.ended.is_empty() && self.candidates.is_empty()
    }
}

/// Compares `tracked` against `live`.
pub fn diff(tracked: &HashSet<Pid>, live: &HashSet<Pid>) -> SnapshotDiff {
    let mut ended: Vec<Pid> = tracked.difference(live).copied().collect();
    let mut candidates: Vec<Pid> = live.difference(tracked).copied().collect();
    ended.sort_unstable_by_key(|pid| pid.as_raw());
    candidates.sort_unstable_by_key(|pid| pid.as_raw());

    SnapshotDiff { ended, candidates }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pids(raw: &[i32]) -> HashSet<Pid> {
        raw.iter().copied().map(Pid::from_raw).collect()
    }

    fn sorted(raw: &[i32]) -> Vec<Pid> {
        raw.iter().copied().map(Pid::from_raw).collect()
    }

    #[test]
    fn ended_and_candidates() {
        let result = diff(&pids(&[10, 20, 30]), &pids(&[30, 5, 40, 20]));
        assert_eq!(result.ended, sorted(&[10]));
        assert_eq!(result.candidates, sorted(&[5, 40]));
    }

    #[test]
    fn identical_sets_produce_nothing() {
        let set = pids(&[1, 2, 3]);
        assert!(diff(&set, &set).is_empty());
    }

    #[test]
    fn empty_listing_ends_everything() {
        let result = diff(&pids(&[300, 100, 200]), &HashSet::new());
        assert_eq!(result.ended, sorted(&[100, 200, 300]));
        assert!(result.candidates.is_empty());
    }
}
