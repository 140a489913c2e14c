//! Records the lifetime of user applications in the `process_events` table.
//!
//! Every tick the process table is listed and compared with the PIDs already
//! tracked: new processes accepted by [`should_track`] get an open record,
//! ended ones get their record closed. Records left open by a previous run are
//! reconciled before the first tick.

use std::time::Duration;

use event_store::unix_now;
use proc_snapshot::{Pid, ProcfsSource};
use procguard_core::{
    pdk::{
        AgentModule, ConfigError, FailureStreak, ModuleConfig, ModuleContext, ModuleError,
    },
    platform::Platform,
};
use tokio::time::{self, Interval, MissedTickBehavior};

mod heuristic;
mod ignore;
mod tracker;

pub use heuristic::{
    ClassificationPolicy, DEFAULT_MIN_USER_UID, RejectReason, Verdict, should_track,
};
pub use ignore::IgnoreList;
pub use tracker::LifecycleTracker;

const MODULE_NAME: &str = "process-tracker";
const DEFAULT_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    interval: Duration,
    min_user_uid: u32,
    ignore_extra: Vec<String>,
}

impl Config {
    fn policy(&self) -> ClassificationPolicy {
        let mut ignore = IgnoreList::for_platform(Platform::current());
        ignore.extend(self.ignore_extra.iter().cloned());
        ClassificationPolicy {
            self_pid: Pid::this(),
            min_user_uid: self.min_user_uid,
            ignore,
        }
    }
}

impl TryFrom<&ModuleConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            interval: config.millis_with_default("interval_ms", DEFAULT_INTERVAL_MS)?,
            min_user_uid: config.with_default("min_user_uid", DEFAULT_MIN_USER_UID)?,
            ignore_extra: config.get_list("ignore_extra")?,
        })
    }
}

pub struct TrackerState {
    tracker: LifecycleTracker,
    source: ProcfsSource,
    interval: Duration,
    failures: FailureStreak,
}

pub struct ProcessTrackerModule;

impl AgentModule for ProcessTrackerModule {
    type Config = Config;
    type State = TrackerState;
    type Extension = Interval;
    type TriggerOutput = ();

    const MODULE_NAME: &'static str = MODULE_NAME;
    const DEFAULT_ENABLED: bool = true;

    async fn init_state(
        &self,
        config: &Self::Config,
        ctx: &ModuleContext,
    ) -> Result<(Self::State, Self::Extension), ModuleError> {
        let source = ProcfsSource;
        let mut tracker = LifecycleTracker::new(config.policy());

        let open_pids = ctx.store().open_process_pids().unwrap_or_else(|err| {
            log::warn!(target: ctx.module_name(), "Reading open process records failed: {err}");
            Vec::new()
        });
        for job in tracker.reconcile(&open_pids, &source, unix_now()) {
            ctx.enqueue(job).await?;
        }

        let state = TrackerState {
            tracker,
            source,
            interval: config.interval,
            failures: FailureStreak::default(),
        };
        Ok((state, new_interval(config.interval)))
    }

    async fn trigger(extension: &mut Self::Extension) -> Result<(), ModuleError> {
        extension.tick().await;
        Ok(())
    }

    async fn action(
        _trigger_output: &Self::TriggerOutput,
        _config: &Self::Config,
        state: &mut Self::State,
        ctx: &ModuleContext,
    ) -> Result<(), ModuleError> {
        let jobs = match state.tracker.tick(&state.source, unix_now()) {
            Ok(jobs) => jobs,
            Err(err) => {
                state
                    .failures
                    .failed(ctx, format!("Skipping tick: {err}"))
                    .await;
                return Ok(());
            }
        };
        state.failures.succeeded(ctx);
        for job in jobs {
            ctx.enqueue(job).await?;
        }
        Ok(())
    }

    async fn on_config_change(
        new_config: &Self::Config,
        state: &mut Self::State,
        extension: &mut Self::Extension,
        ctx: &ModuleContext,
    ) -> Result<(), ModuleError> {
        state.tracker.set_policy(new_config.policy());
        if state.interval != new_config.interval {
            log::info!(
                target: ctx.module_name(),
                "Polling every {}ms",
                new_config.interval.as_millis()
            );
            state.interval = new_config.interval;
            *extension = new_interval(new_config.interval);
        }
        Ok(())
    }

    async fn graceful_stop(state: Self::State, ctx: &ModuleContext) -> Result<(), ModuleError> {
        log::info!(
            target: ctx.module_name(),
            "Leaving {} process records open until the next start",
            state.tracker.tracked().len()
        );
        Ok(())
    }
}

fn new_interval(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::try_from(&ModuleConfig::default()).unwrap();
        assert_eq!(config.interval, Duration::from_millis(2000));
        assert_eq!(config.min_user_uid, 1000);
        assert!(config.ignore_extra.is_empty());
    }

    #[test]
    fn config_overrides() {
        let config = Config::try_from(&ModuleConfig::from_iter([
            ("interval_ms", "250"),
            ("min_user_uid", "500"),
            ("ignore_extra", "steam, discord"),
        ]))
        .unwrap();
        assert_eq!(config.interval, Duration::from_millis(250));
        let policy = config.policy();
        assert_eq!(policy.min_user_uid, 500);
        assert!(policy.ignore.is_ignored("discord"));
        assert_eq!(policy.self_pid, Pid::this());
    }

    #[test]
    fn invalid_config() {
        assert!(Config::try_from(&ModuleConfig::from_iter([("interval_ms", "0")])).is_err());
        assert!(Config::try_from(&ModuleConfig::from_iter([("min_user_uid", "-1")])).is_err());
    }
}
