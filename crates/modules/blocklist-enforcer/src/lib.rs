//! Kills processes whose name appears in the application blocklist.
//!
//! The blocklist file is re-read on every tick, so edits made by the CLI take
//! effect within one interval.

use std::time::Duration;

use blocklist::Blocklist;
use proc_snapshot::{Pid, ProcfsSource, SignalKiller};
use procguard_core::pdk::{
    AgentModule, ConfigError, FailureStreak, ModuleConfig, ModuleContext, ModuleError,
};
use tokio::time::{self, Interval, MissedTickBehavior};

mod sweep;

pub use sweep::{SweepReport, sweep};

const MODULE_NAME: &str = "blocklist-enforcer";
const DEFAULT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    interval: Duration,
}

impl TryFrom<&ModuleConfig> for Config {
    type Error = ConfigError;

    fn try_from(config: &ModuleConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            interval: config.millis_with_default("interval_ms", DEFAULT_INTERVAL_MS)?,
        })
    }
}

pub struct EnforcerState {
    blocklist: Blocklist,
    self_pid: Pid,
    interval: Duration,
    failures: FailureStreak,
}

pub struct BlocklistEnforcerModule;

impl AgentModule for BlocklistEnforcerModule {
    type Config = Config;
    type State = EnforcerState;
    type Extension = Interval;
    type TriggerOutput = ();

    const MODULE_NAME: &'static str = MODULE_NAME;
    const DEFAULT_ENABLED: bool = true;

    async fn init_state(
        &self,
        config: &Self::Config,
        ctx: &ModuleContext,
    ) -> Result<(Self::State, Self::Extension), ModuleError> {
        let blocklist = Blocklist::apps(ctx.data_dir());
        log::debug!(
            target: ctx.module_name(),
            "Enforcing {}",
            blocklist.path().display()
        );
        let state = EnforcerState {
            blocklist,
            self_pid: Pid::this(),
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
        let blocked = load_blocked(&state.blocklist, ctx.module_name());
        match sweep(&blocked, &ProcfsSource, &SignalKiller, state.self_pid) {
            Ok(_) => state.failures.succeeded(ctx),
            Err(err) => {
                state
                    .failures
                    .failed(ctx, format!("Skipping sweep: {err}"))
                    .await
            }
        }
        Ok(())
    }

    async fn on_config_change(
        new_config: &Self::Config,
        state: &mut Self::State,
        extension: &mut Self::Extension,
        _ctx: &ModuleContext,
    ) -> Result<(), ModuleError> {
        if state.interval != new_config.interval {
            state.interval = new_config.interval;
            *extension = new_interval(new_config.interval);
        }
        Ok(())
    }
}

/// Reads the blocklist, treating an unreadable file as empty until the next tick.
fn load_blocked(blocklist: &Blocklist, target: &str) -> Vec<String> {
    blocklist.load().unwrap_or_else(|err| {
        log::warn!(target: target, "{err}, enforcing nothing this tick");
        Vec::new()
    })
}

fn new_interval(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
