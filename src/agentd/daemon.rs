use std::collections::HashMap;

use anyhow::bail;
use procguard_core::pdk::{
    AgentDaemonCommand, AgentDaemonError, AgentDaemonHandle, AgentModule, ModuleDetails,
    ModuleOverview, ModuleStatus,
};
use tokio::sync::mpsc;

use super::{
    config::{AgentConfig, GENERAL_CONFIG},
    module_manager::{ModuleManagerHandle, ModuleServices, create_module_manager},
};

/// Collects the modules of the agent before the daemon starts them.
pub struct AgentDaemonStarter {
    config: AgentConfig,
    services: ModuleServices,
    modules: HashMap<String, (ModuleDetails, ModuleManagerHandle)>,
    tx_modules_cmd: mpsc::Sender<AgentDaemonCommand>,
    rx_modules_cmd: mpsc::Receiver<AgentDaemonCommand>,
}

impl AgentDaemonStarter {
    pub(super) fn new(config: AgentConfig, services: ModuleServices) -> Self {
        let (tx_modules_cmd, rx_modules_cmd) = mpsc::channel(8);
        Self {
            config,
            services,
            modules: Default::default(),
            tx_modules_cmd,
            rx_modules_cmd,
        }
    }

    pub fn add_module<T: AgentModule>(&mut self, module: T) -> anyhow::Result<()> {
        let module_name = module.name().to_string();
        let module_details = module.details();

        let config = self.config.get_watched_module_config(&module_name);

        let module_handle = create_module_manager(module, config, self.services.clone());

        if self
            .modules
            .insert(module_name.clone(), (module_details, module_handle))
            .is_some()
        {
            bail!("Error creating modules: module {module_name} already present")
        }

        Ok(())
    }

    /// Starts every enabled module and the [`AgentDaemon`] actor managing them.
    ///
    /// Returns the [`AgentDaemonHandle`] that can be used to interact with the actor.
    pub(super) async fn start_daemon(self) -> AgentDaemonHandle {
        let daemon = AgentDaemon {
            modules: self.modules,
            config: self.config,
            rx_cmd: self.rx_modules_cmd,
        };

        let mut names: Vec<&String> = daemon.modules.keys().collect();
        names.sort();
        for module_name in names {
            let (_, module_handle) = &daemon.modules[module_name];
            if daemon.is_enabled(module_name) {
                log::info!("Starting module {module_name}");
                if let Err(err) = module_handle.start().await {
                    log::error!("{err}");
                }
            } else {
                log::info!("Module {module_name} is disabled");
            }
        }

        tokio::spawn(run_daemon_actor(daemon));

        AgentDaemonHandle::new(self.tx_modules_cmd)
    }
}

/// Main component of the agent, implemented with the actor pattern. Its entrypoint is the [`AgentDaemonHandle`].
///
/// Every loaded module is wrapped inside a [`super::module_manager::ModuleManager`] actor managing its lifecycle.
///
/// [`AgentDaemon`] can:
/// - administrate loaded modules using the relative [`ModuleManagerHandle`]
/// - reload module configurations using [`AgentConfig`], starting or stopping
///   modules whose `enabled` flag changed
pub struct AgentDaemon {
    modules: HashMap<String, (ModuleDetails, ModuleManagerHandle)>,
    config: AgentConfig,
    rx_cmd: mpsc::Receiver<AgentDaemonCommand>,
}

impl AgentDaemon {
    /// Handle commands coming from [`AgentDaemonHandle`].
    async fn handle_cmd(&self, cmd: AgentDaemonCommand) {
        match cmd {
            AgentDaemonCommand::ModulesList { tx_reply } => {
                let _ = tx_reply.send(self.modules().await);
            }
            AgentDaemonCommand::StopModule {
                tx_reply,
                module_name,
            } => {
                let _ = tx_reply.send(self.stop(&module_name).await);
            }
            AgentDaemonCommand::ReloadConfiguration { tx_reply } => {
                let _ = tx_reply.send(self.reload_config().await);
            }
        }
    }

    fn module(&self, module_name: &str) -> Result<&ModuleManagerHandle, AgentDaemonError> {
        self.modules
            .get(module_name)
            .map(|(_, handle)| handle)
            .ok_or_else(|| AgentDaemonError::ModuleNotFound(module_name.to_string()))
    }

    /// Reads the `enabled` flag of a module, an invalid value disables it.
    fn is_enabled(&self, module_name: &str) -> bool {
        let Some((details, _)) = self.modules.get(module_name) else {
            return false;
        };
        self.config
            .get_module_config(module_name)
            .unwrap_or_default()
            .with_default("enabled", details.enabled_by_default)
            .unwrap_or_else(|err| {
                log::warn!("Module {module_name} disabled: {err}");
                false
            })
    }

    async fn stop(&self, module_name: &str) -> Result<(), AgentDaemonError> {
        self.module(module_name)?
            .stop()
            .await
            .map_err(AgentDaemonError::StopError)
    }

    /// Get loaded module list, sorted by name.
    async fn modules(&self) -> Vec<ModuleOverview> {
        let mut v = Vec::new();
        for (name, (details, handle)) in self.modules.iter() {
            v.push(ModuleOverview {
                name: name.clone(),
                version: details.version.clone(),
                status: handle.status().await,
            })
        }
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }

    async fn reload_config(&self) -> Result<Vec<String>, AgentDaemonError> {
        let changed = self.config.reload()?;
        for section in &changed {
            if section == GENERAL_CONFIG {
                log::warn!("Changes to [{GENERAL_CONFIG}] take effect after a restart");
                continue;
            }
            let Ok(handle) = self.module(section) else {
                continue;
            };
            let running = matches!(handle.status().await, ModuleStatus::Running(_));
            match (self.is_enabled(section), running) {
                (true, false) => {
                    log::info!("Starting module {section}");
                    if let Err(err) = handle.start().await {
                        log::error!("{err}");
                    }
                }
                (false, true) => {
                    log::info!("Stopping disabled module {section}");
                    if let Err(err) = handle.stop().await {
                        log::error!("{err}");
                    }
                }
                _ => {}
            }
        }
        Ok(changed)
    }
}

/// Stops every running module, returning the ones which failed to stop.
///
/// Modules found in any other status are only logged.
pub(super) async fn stop_running_modules(
    daemon: &AgentDaemonHandle,
) -> Vec<(String, AgentDaemonError)> {
    let mut failures = Vec::new();
    for module in daemon.modules().await {
        if !matches!(module.status, ModuleStatus::Running(_)) {
            log::debug!("Module {} not running: {}", module.name, module.status);
            continue;
        }
        if let Err(err) = daemon.stop(module.name.clone()).await {
            failures.push((module.name, err));
        }
    }
    failures
}

/// Run a [`AgentDaemon`] actor.
async fn run_daemon_actor(mut actor: AgentDaemon) {
    while let Some(cmd) = actor.rx_cmd.recv().await {
        actor.handle_cmd(cmd).await;
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use event_store::{EventStore, WriteSerializer};
    use procguard_core::pdk::{ModuleContext, ModuleError, NoConfig};
    use tokio::time;

    use super::*;

    struct Idle;

    impl AgentModule for Idle {
        type Config = NoConfig;
        type State = ();
        type Extension = ();
        type TriggerOutput = ();

        const MODULE_NAME: &'static str = "idle";
        const DEFAULT_ENABLED: bool = false;

        async fn init_state(
            &self,
            _config: &Self::Config,
            _ctx: &ModuleContext,
        ) -> Result<(Self::State, Self::Extension), ModuleError> {
            Ok(((), ()))
        }

        async fn trigger(_extension: &mut Self::Extension) -> Result<(), ModuleError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn action(
            _trigger_output: &Self::TriggerOutput,
            _config: &Self::Config,
            _state: &mut Self::State,
            _ctx: &ModuleContext,
        ) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    struct Broken;

    impl AgentModule for Broken {
        type Config = NoConfig;
        type State = ();
        type Extension = ();
        type TriggerOutput = ();

        const MODULE_NAME: &'static str = "broken";
        const DEFAULT_ENABLED: bool = true;

        async fn init_state(
            &self,
            _config: &Self::Config,
            _ctx: &ModuleContext,
        ) -> Result<(Self::State, Self::Extension), ModuleError> {
            Err("no process table".into())
        }

        async fn trigger(_extension: &mut Self::Extension) -> Result<(), ModuleError> {
            Ok(())
        }

        async fn action(
            _trigger_output: &Self::TriggerOutput,
            _config: &Self::Config,
            _state: &mut Self::State,
            _ctx: &ModuleContext,
        ) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    async fn starter(ini: &str) -> (tempfile::TempDir, WriteSerializer, AgentDaemonStarter) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("procguard.ini");
        fs::write(&file, ini).unwrap();
        let config = AgentConfig::with_custom_file(file.to_str().unwrap()).unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let serializer = WriteSerializer::start(&store, 8).unwrap();
        let services = ModuleServices {
            store,
            writer: serializer.handle(),
            data_dir: dir.path().to_path_buf(),
        };
        let starter = AgentDaemonStarter::new(config, services);
        (dir, serializer, starter)
    }

    async fn status_of(daemon: &AgentDaemonHandle, module_name: &str) -> ModuleStatus {
        daemon
            .modules()
            .await
            .into_iter()
            .find(|module| module.name == module_name)
            .map(|module| module.status)
            .unwrap()
    }

    #[tokio::test]
    async fn enabled_flag_decides_startup() {
        let (_dir, _serializer, mut starter) = starter("[idle]\nenabled = true\n").await;
        starter.add_module(Idle).unwrap();
        assert!(starter.add_module(Idle).is_err());

        let daemon = starter.start_daemon().await;
        let modules = daemon.modules().await;
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].status, ModuleStatus::Running(Vec::new()));

        daemon.stop("idle".to_string()).await.unwrap();
        assert_eq!(status_of(&daemon, "idle").await, ModuleStatus::Stopped);
        assert!(matches!(
            daemon.stop("missing".to_string()).await,
            Err(AgentDaemonError::ModuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn disabled_by_default() {
        let (_dir, _serializer, mut starter) = starter("").await;
        starter.add_module(Idle).unwrap();
        let daemon = starter.start_daemon().await;
        assert_eq!(status_of(&daemon, "idle").await, ModuleStatus::Created);
    }

    #[tokio::test]
    async fn reload_applies_the_enabled_flag() {
        let (dir, _serializer, mut starter) = starter("[idle]\nenabled = false\n").await;
        starter.add_module(Idle).unwrap();
        let daemon = starter.start_daemon().await;
        assert_eq!(status_of(&daemon, "idle").await, ModuleStatus::Created);

        let file = dir.path().join("procguard.ini");
        fs::write(&file, "[idle]\nenabled = true\n").unwrap();
        assert_eq!(daemon.reload_configuration().await.unwrap(), vec!["idle"]);
        assert_eq!(
            status_of(&daemon, "idle").await,
            ModuleStatus::Running(Vec::new())
        );

        // Unchanged sections leave a running module alone.
        assert!(daemon.reload_configuration().await.unwrap().is_empty());
        assert_eq!(
            status_of(&daemon, "idle").await,
            ModuleStatus::Running(Vec::new())
        );

        fs::write(&file, "[idle]\nenabled = false\n").unwrap();
        assert_eq!(daemon.reload_configuration().await.unwrap(), vec!["idle"]);
        assert_eq!(status_of(&daemon, "idle").await, ModuleStatus::Stopped);
    }

    #[tokio::test]
    async fn shutdown_skips_failed_modules() {
        let (_dir, _serializer, mut starter) = starter("[idle]\nenabled = true\n").await;
        starter.add_module(Idle).unwrap();
        starter.add_module(Broken).unwrap();
        let daemon = starter.start_daemon().await;
        assert!(matches!(
            status_of(&daemon, "broken").await,
            ModuleStatus::Failed(_)
        ));

        assert!(stop_running_modules(&daemon).await.is_empty());
        assert_eq!(status_of(&daemon, "idle").await, ModuleStatus::Stopped);
        assert!(matches!(
            status_of(&daemon, "broken").await,
            ModuleStatus::Failed(_)
        ));
    }
}
