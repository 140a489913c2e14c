use anyhow::{Context, Result};
use blocklist::Blocklist;
use event_store::{EventStore, WriteSerializer};
use native_messaging::{DEFAULT_GUI_ORIGIN, DEFAULT_POLL_INTERVAL, HostConfig, NativeHost};
use procguard_core::pdk::ModuleConfig;

use crate::{
    agentd::{AgentConfig, NATIVE_HOST_CONFIG},
    cli::native_host::NativeHostOpts,
};

/// Serves the browser extension connected to stdin and stdout until it
/// disconnects, then drains the write queue.
///
/// Stdout carries the framed protocol, console logs go to stderr.
pub async fn native_host_run(options: &NativeHostOpts) -> Result<()> {
    log::trace!("Native host options: {:?}", options);

    let config = AgentConfig::load(options.config_file.as_deref())?;
    let data_dir = config.data_dir()?;
    let host_config = host_config(
        &config
            .get_module_config(NATIVE_HOST_CONFIG)
            .unwrap_or_default(),
    )?;

    let store = EventStore::open(&data_dir)
        .with_context(|| format!("Error opening the event store in {}", data_dir.display()))?;
    let serializer = WriteSerializer::start(&store, config.write_queue_capacity()?)
        .context("Error starting the write queue")?;
    crate::log_sink::attach(serializer.handle());

    let host = NativeHost::new(serializer.handle(), Blocklist::web(&data_dir), host_config);
    let served = host.run(tokio::io::stdin(), tokio::io::stdout()).await;

    let stats = serializer
        .shutdown()
        .await
        .context("Error draining the write queue")?;
    log::debug!(
        "Write queue drained: {} jobs applied, {} failed",
        stats.applied,
        stats.failed
    );

    served.context("Native messaging failed")
}

fn host_config(section: &ModuleConfig) -> Result<HostConfig> {
    let default_ms = u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX);
    Ok(HostConfig {
        gui_origin: section.with_default("gui_origin", DEFAULT_GUI_ORIGIN.to_string())?,
        poll_interval: section.millis_with_default("poll_interval_ms", default_ms)?,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn host_config_defaults() {
        let config = host_config(&ModuleConfig::default()).unwrap();
        assert_eq!(config.gui_origin, DEFAULT_GUI_ORIGIN);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn host_config_overrides() {
        let section: ModuleConfig = [
            ("gui_origin", "http://localhost:9000"),
            ("poll_interval_ms", "250"),
        ]
        .into_iter()
        .collect();
        let config = host_config(&section).unwrap();
        assert_eq!(config.gui_origin, "http://localhost:9000");
        assert_eq!(config.poll_interval, Duration::from_millis(250));

        let zero: ModuleConfig = [("poll_interval_ms", "0")].into_iter().collect();
        assert!(host_config(&zero).is_err());
    }
}
