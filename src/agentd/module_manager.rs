use std::path::PathBuf;

use event_store::{EventStore, WriteHandle};
use procguard_core::pdk::{
    AgentModule, CleanExit, ModuleConfig, ModuleContext, ModuleError,
    ModuleSignal, ModuleStatus, ShutdownSender, ShutdownSignal,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Messages used for internal communication between [`ModuleManagerHandle`] and the underlying [`ModuleManager`] actor.
enum ModuleManagerCommand {
    StartModule {
        tx_reply: oneshot::Sender<Result<(), String>>,
    },
    StopModule {
        tx_reply: oneshot::Sender<Result<(), String>>,
    },
    GetStatus {
        tx_reply: oneshot::Sender<ModuleStatus>,
    },
}

/// Services every module receives through its [`ModuleContext`].
#[derive(Clone)]
pub struct ModuleServices {
    pub store: EventStore,
    pub writer: WriteHandle,
    pub data_dir: PathBuf,
}

/// Actor responsible of the underlying module lifecycle.
///
/// The module value is the recipe used to start a fresh task every time the
/// upper layer asks for it. Once started, the task runs [`run_module_loop`].
pub struct ModuleManager<T: AgentModule> {
    tx_sig: mpsc::Sender<ModuleSignal>,
    rx_sig: mpsc::Receiver<ModuleSignal>,
    rx_cmd: mpsc::Receiver<ModuleManagerCommand>,
    services: ModuleServices,
    module: T,
    config: watch::Receiver<ModuleConfig>,
    status: ModuleStatus,
    running_task: Option<(ShutdownSender, JoinHandle<()>)>,
}

impl<T: AgentModule> ModuleManager<T> {
    fn new(
        rx_cmd: mpsc::Receiver<ModuleManagerCommand>,
        module: T,
        config: watch::Receiver<ModuleConfig>,
        services: ModuleServices,
    ) -> Self {
        let (tx_sig, rx_sig) = mpsc::channel(8);
        Self {
            tx_sig,
            rx_sig,
            rx_cmd,
            services,
            module,
            config,
            status: ModuleStatus::Created,
            running_task: None,
        }
    }

    /// Handle unrecoverable error coming from modules: the task is stopped
    /// and the module marked as failed.
    async fn handle_module_error(&mut self, err: ModuleError) {
        match self.running_task.take() {
            Some((tx_shutdown, task)) => {
                tx_shutdown.send_signal();
                match task.await {
                    Ok(()) => {
                        log::error!(
                            "Error in module {}. Module stopped. {err:?}",
                            T::MODULE_NAME
                        );
                        self.status = ModuleStatus::Failed(err.to_string());
                    }
                    Err(join_err) => {
                        let err_msg = format!(
                            "Error in module {}: {err}. Stopping module failed: {join_err:?}",
                            T::MODULE_NAME
                        );
                        log::error!("{err_msg}");
                        self.status = ModuleStatus::Failed(err_msg);
                    }
                }
            }
            None => {
                let err_msg = format!(
                    "Error in module {err}. Stopping module {} failed: Module found in status: {:?}",
                    T::MODULE_NAME,
                    self.status
                );
                log::error!("{err_msg}");
                self.status = ModuleStatus::Failed(err_msg);
            }
        }
    }

    /// Handle commands coming from [`ModuleManagerHandle`].
    async fn handle_cmd(&mut self, cmd: ModuleManagerCommand) {
        match cmd {
            ModuleManagerCommand::StartModule { tx_reply } => {
                let result = self.start().await;
                // The `let _ =` ignores any errors when sending.
                //
                // This can happen if the `select!` macro is used
                // to cancel waiting for the response.
                let _ = tx_reply.send(result);
            }
            ModuleManagerCommand::StopModule { tx_reply } => {
                let result = self.stop().await;
                let _ = tx_reply.send(result);
            }
            ModuleManagerCommand::GetStatus { tx_reply } => {
                let _ = tx_reply.send(self.status.clone());
            }
        }
    }

    async fn start(&mut self) -> Result<(), String> {
        if self.running_task.is_some() {
            return Ok(());
        }

        let module_config = match T::Config::try_from(&self.config.borrow_and_update()) {
            Ok(mc) => mc,
            Err(err) => {
                self.status = ModuleStatus::Failed(format!("Configuration error: {err}"));
                return Err(format!(
                    "Starting module {} failed, error in configuration: {err}",
                    T::MODULE_NAME
                ));
            }
        };

        let ModuleServices {
            store,
            writer,
            data_dir,
        } = self.services.clone();
        let ctx = ModuleContext::new(
            T::MODULE_NAME.into(),
            self.tx_sig.clone(),
            store,
            writer,
            data_dir,
        );

        let (state, extension) = match self.module.init_state(&module_config, &ctx).await {
            Ok(s) => s,
            Err(err) => {
                self.status = ModuleStatus::Failed(format!("State initializing error: {err}"));
                return Err(format!(
                    "Starting module {} failed, error initializing the state: {err}",
                    T::MODULE_NAME
                ));
            }
        };

        let rx_config = self.config.clone();
        let (tx_shutdown, rx_shutdown) = ShutdownSignal::new();
        let tx_sig = self.tx_sig.clone();

        // Check error and forward to this module manager actor
        let join_handle = tokio::spawn(async move {
            let res =
                run_module_loop::<T>(module_config, state, extension, rx_config, rx_shutdown, &ctx);
            if let Err(err) = res.await {
                let _ = tx_sig.send(ModuleSignal::Error(err)).await;
            }
        });

        self.running_task = Some((tx_shutdown, join_handle));
        self.status = ModuleStatus::Running(Vec::new());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), String> {
        let Some((tx_shutdown, task)) = self.running_task.take() else {
            return match self.status {
                ModuleStatus::Failed(_) => Err(format!(
                    "Stopping module {} failed: Module found in status: {:?}",
                    T::MODULE_NAME,
                    self.status
                )),
                _ => Ok(()),
            };
        };

        tx_shutdown.send_signal();
        match task.await {
            Ok(()) => {
                log::info!("Module {} exited", T::MODULE_NAME);
                self.status = ModuleStatus::Stopped;
                Ok(())
            }
            Err(err) => {
                log::warn!("Module {} exit failure: {err}", T::MODULE_NAME);
                self.status = ModuleStatus::Failed(err.to_string());
                Err(err.to_string())
            }
        }
    }

    pub fn add_warning(&mut self, warning: String) {
        if let ModuleStatus::Running(warnings) = &mut self.status {
            warnings.push(warning);
        }
    }
}

impl<T: AgentModule> Drop for ModuleManager<T> {
    /// Stop the task when dropped
    fn drop(&mut self) {
        if let Some((tx_shutdown, _)) = self.running_task.take() {
            tx_shutdown.send_signal();
        }
    }
}

/// Handle to a running [`ModuleManager`].
///
/// Provides module status and lifecycle management functionalities.
#[derive(Clone)]
pub struct ModuleManagerHandle {
    tx_cmd: mpsc::Sender<ModuleManagerCommand>,
}

impl ModuleManagerHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> ModuleManagerCommand,
    ) -> Option<R> {
        let (send, recv) = oneshot::channel();
        // Ignore send errors. If this send fails, so does the
        // recv.await below. There's no reason to check the
        // failure twice.
        let _ = self.tx_cmd.send(build(send)).await;
        recv.await.ok()
    }

    /// Get module status
    pub async fn status(&self) -> ModuleStatus {
        self.request(|tx_reply| ModuleManagerCommand::GetStatus { tx_reply })
            .await
            .unwrap_or_else(|| ModuleStatus::Failed("module manager stopped".to_string()))
    }

    /// Start the module
    pub async fn start(&self) -> Result<(), String> {
        self.request(|tx_reply| ModuleManagerCommand::StartModule { tx_reply })
            .await
            .unwrap_or_else(|| Err("module manager stopped".to_string()))
    }

    /// Stop the module
    pub async fn stop(&self) -> Result<(), String> {
        self.request(|tx_reply| ModuleManagerCommand::StopModule { tx_reply })
            .await
            .unwrap_or_else(|| Err("module manager stopped".to_string()))
    }
}

/// Create and start a [`ModuleManager`] actor to manage the specific agent module.
///
/// Returns the [`ModuleManagerHandle`] that can be used to interact with the [`ModuleManager`] actor.
pub fn create_module_manager<T: AgentModule>(
    module: T,
    config: watch::Receiver<ModuleConfig>,
    services: ModuleServices,
) -> ModuleManagerHandle {
    // Create command channel used in the ModuleManagerHandle to send commands to the running ModuleManager actor
    let (tx_cmd, rx_cmd) = mpsc::channel(8);

    let actor = ModuleManager::new(rx_cmd, module, config, services);

    tokio::spawn(run_module_manager_actor(actor));

    ModuleManagerHandle { tx_cmd }
}

/// Run a [`ModuleManager`] actor.
async fn run_module_manager_actor<T: AgentModule>(mut actor: ModuleManager<T>) {
    loop {
        tokio::select!(
            Some(sig) = actor.rx_sig.recv() => match sig {
                ModuleSignal::Error(err) => actor.handle_module_error(err).await,
                ModuleSignal::Warning(warn) => actor.add_warning(warn),
            },
            cmd = actor.rx_cmd.recv() => match cmd {
                Some(cmd) => actor.handle_cmd(cmd).await,
                None => return
            }
        )
    }
}

async fn run_module_loop<T: AgentModule>(
    mut config: T::Config,
    mut state: T::State,
    mut extension: T::Extension,
    rx_config: watch::Receiver<ModuleConfig>,
    mut rx_shutdown: ShutdownSignal,
    ctx: &ModuleContext,
) -> Result<CleanExit, ModuleError> {
    // Dropped once the configuration sender is gone.
    let mut rx_config = Some(rx_config);

    loop {
        tokio::select! {
            // Futures need to polled in a specific order
            biased;
            r = rx_shutdown.recv() => {
                T::graceful_stop(state, ctx).await?;
                return r
            },
            change = next_config(&mut rx_config) => match change {
                Some(module_config) => {
                    let new_config = T::Config::try_from(&module_config)?;
                    T::on_config_change(&new_config, &mut state, &mut extension, ctx).await?;
                    config = new_config;
                }
                None => rx_config = None,
            },
            t_output = T::trigger(&mut extension) => {
                let t_output = t_output?;
                T::action(&t_output, &config, &mut state, ctx).await?
            }
        }
    }
}

/// Waits for the next configuration of the module, `None` when the sender is gone.
async fn next_config(rx_config: &mut Option<watch::Receiver<ModuleConfig>>) -> Option<ModuleConfig> {
    match rx_config {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
