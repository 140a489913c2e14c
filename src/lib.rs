//! procguard is a local agent recording which applications a user runs and
//! which sites they visit, and enforcing application and domain blocklists.
//!
//! A single binary provides three entry points:
//!
//! - `procguard daemon`: the modular [agent](crate::agentd) run in the user
//!   session. It owns the [modules](#modules) and the event store.
//! - `procguard native-host`: the native messaging host started by the
//!   browser for the extension, see [`native_messaging`].
//! - `procguard block`: edits the blocklists consumed by the other two.
//!
//! ```sh
//! # Run the agent
//! procguard daemon
//!
//! # Block an application
//! procguard block add steam
//! ```
//!
//! Every write to the event store goes through one write queue per process,
//! applied by a single worker in submission order.
//!
//! ## Modules
//!
//! Functionality is provided by agent [modules](procguard_core::pdk). Each
//! one is configured by the INI section carrying its name and runs as a
//! supervised task that can be started, stopped and reconfigured at runtime.
//!
//! ## Feature flags
//!
//! - `default`: Enables `full`.
//! - `full`: Enables every module listed below.
//! - `process-tracker`: Records the lifetime of user applications.
//! - `blocklist-enforcer`: Terminates processes named in the application blocklist.
//! - `sqlite3-vendored`: Builds SQLite from source instead of linking the system library.

pub mod agentd;
pub mod block;
pub mod cli;
pub mod log_sink;
pub mod native_host;
pub mod utils;

pub mod metadata {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Init logger. We log from info level and above, to stderr.
/// If RUST_LOG is set, we assume the user wants to debug something
/// and use env_logger default behaviour.
///
/// Records reaching the console are also copied into the event store once
/// [`log_sink::attach`] has been called.
pub fn init_logger(override_log_level: Option<log::LevelFilter>) {
    let mut builder = if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env()
    } else {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(override_log_level.unwrap_or(log::LevelFilter::Info));
        builder
    };
    let logger = builder.build();
    let max_level = logger.filter();

    let sink = log_sink::StoreLogSink::new(logger, &log_sink::LOG_WRITER);
    if log::set_boxed_logger(Box::new(sink)).is_ok() {
        log::set_max_level(max_level);
    }
}

/// Registers the modules compiled into this binary.
pub fn add_modules(starter: &mut agentd::AgentDaemonStarter) -> anyhow::Result<()> {
    #[cfg(feature = "process-tracker")]
    starter.add_module(process_tracker::ProcessTrackerModule)?;

    #[cfg(feature = "blocklist-enforcer")]
    starter.add_module(blocklist_enforcer::BlocklistEnforcerModule)?;

    let _ = starter;
    Ok(())
}
