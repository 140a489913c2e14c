//! This module includes all the necessary to build modules for the procguard agent
//!
//! Modules implement [`AgentModule`]. The trait-based API defines:
//! - associated types for configuration, state, extension and trigger output
//! - constants `MODULE_NAME` and `DEFAULT_ENABLED`
//! - async lifecycle methods: `init_state`, `trigger`, `action`, `on_config_change` and `graceful_stop`
//!
//! The [`ModuleContext`] is the entrypoint to the agent features. It lets a module:
//! - submit write jobs to the shared serializer via `ModuleContext::enqueue`
//! - read from the event store
//! - raise warnings shown in the module status
//!
//! Configuration updates are delivered by the runtime to the trait methods.
//!
//! # Example
//!
//! A module recording a log line every second.
//!
//! ```
//! use event_store::jobs;
//! use procguard_core::pdk::{AgentModule, ModuleContext, ModuleError, NoConfig};
//! use tokio::time::{self, Duration};
//!
//! pub struct Heartbeat;
//!
//! impl AgentModule for Heartbeat {
//!     type Config = NoConfig;
//!     type State = u64;
//!     type Extension = time::Interval;
//!     type TriggerOutput = ();
//!
//!     const MODULE_NAME: &'static str = "heartbeat";
//!     const DEFAULT_ENABLED: bool = false;
//!
//!     async fn init_state(
//!         &self,
//!         _config: &Self::Config,
//!         _ctx: &ModuleContext,
//!     ) -> Result<(Self::State, Self::Extension), ModuleError> {
//!         Ok((0, time::interval(Duration::from_secs(1))))
//!     }
//!
//!     async fn trigger(extension: &mut Self::Extension) -> Result<(), ModuleError> {
//!         extension.tick().await;
//!         Ok(())
//!     }
//!
//!     async fn action(
//!         _trigger_output: &Self::TriggerOutput,
//!         _config: &Self::Config,
//!         beats: &mut Self::State,
//!         ctx: &ModuleContext,
//!     ) -> Result<(), ModuleError> {
//!         *beats += 1;
//!         ctx.enqueue(jobs::insert_log(0, "INFO", &format!("beat {beats}")))
//!             .await?;
//!         Ok(())
//!     }
//! }
//! ```

mod config;
mod daemon;
mod module;
mod module_context;

pub use config::*;
pub use daemon::*;
pub use module::*;
pub use module_context::*;
