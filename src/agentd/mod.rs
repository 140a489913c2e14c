use anyhow::{Context, Result};
use event_store::{EventStore, WriteSerializer};
use tokio::signal::unix::{SignalKind, signal};

use crate::cli::daemon::DaemonOpts;

mod config;
mod daemon;
mod module_manager;

pub use config::{AgentConfig, GENERAL_CONFIG, NATIVE_HOST_CONFIG};
pub use daemon::{AgentDaemon, AgentDaemonStarter};
pub use module_manager::{ModuleManager, ModuleManagerHandle, ModuleServices};

/// Runs the agent until SIGINT or SIGTERM.
///
/// The store is opened first and a failure there is fatal. Modules are
/// registered by `add_modules`, started according to their `enabled` flag and
/// stopped on exit, before the write queue is drained. SIGHUP reloads the
/// configuration.
pub async fn agent_daemon_run(
    options: &DaemonOpts,
    add_modules: impl FnOnce(&mut AgentDaemonStarter) -> Result<()>,
) -> Result<()> {
    log::trace!("Daemon options: {:?}", options);

    let config = AgentConfig::load(options.config_file.as_deref())?;
    let data_dir = config.data_dir()?;
    let store = EventStore::open(&data_dir)
        .with_context(|| format!("Error opening the event store in {}", data_dir.display()))?;
    let serializer = WriteSerializer::start(&store, config.write_queue_capacity()?)
        .context("Error starting the write queue")?;
    crate::log_sink::attach(serializer.handle());

    log::info!(
        "procguard {} recording to {}",
        crate::metadata::VERSION,
        store.path().display()
    );
    log::debug!("Configuration read from {}", config.config_file().display());

    let mut sig_int = signal(SignalKind::interrupt())?;
    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_hup = signal(SignalKind::hangup())?;

    let services = ModuleServices {
        store,
        writer: serializer.handle(),
        data_dir,
    };
    let mut starter = AgentDaemonStarter::new(config, services);
    add_modules(&mut starter)?;
    let agent_daemon = starter.start_daemon().await;

    loop {
        tokio::select! {
            _ = sig_int.recv() => {
                log::trace!("SIGINT received");
                break;
            }
            _ = sig_term.recv() => {
                log::trace!("SIGTERM received");
                break;
            }
            _ = sig_hup.recv() => {
                log::trace!("SIGHUP received");
                match agent_daemon.reload_configuration().await {
                    Ok(changed) if changed.is_empty() => log::info!("Configuration unchanged"),
                    Ok(changed) => log::info!("Configuration reloaded: {}", changed.join(", ")),
                    Err(err) => log::error!("{:#}", anyhow::Error::from(err)),
                }
            }
        }
    }

    log::info!("Terminating procguard daemon...");
    for (module_name, err) in daemon::stop_running_modules(&agent_daemon).await {
        log::warn!("Module {module_name} failed to stop: {err}");
    }

    let stats = serializer
        .shutdown()
        .await
        .context("Error draining the write queue")?;
    log::info!(
        "Write queue drained: {} jobs applied, {} failed",
        stats.applied,
        stats.failed
    );

    Ok(())
}
