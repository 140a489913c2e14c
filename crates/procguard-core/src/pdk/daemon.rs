use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::ModuleConfig;

/// Error happening during daemon administration.
#[derive(Error, Debug)]
pub enum AgentDaemonError {
    #[error("module {0} not found")]
    ModuleNotFound(String),
    #[error("{0}")]
    StopError(String),
    #[error("error reloading the configuration")]
    ConfigurationReloadError(#[from] anyhow::Error),
    #[error("daemon actor is not running")]
    ActorStopped,
}

/// Handle to a running agent daemon.
///
/// Provides module overviews and administration functionalities.
#[derive(Debug, Clone)]
pub struct AgentDaemonHandle {
    pub tx_cmd: mpsc::Sender<AgentDaemonCommand>,
}

impl AgentDaemonHandle {
    pub fn new(sender: mpsc::Sender<AgentDaemonCommand>) -> Self {
        Self { tx_cmd: sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> AgentDaemonCommand,
    ) -> Result<T, AgentDaemonError> {
        let (send, recv) = oneshot::channel();

        // Ignore send errors. If this send fails, so does the
        // recv.await below. There's no reason to check the
        // failure twice.
        let _ = self.tx_cmd.send(build(send)).await;
        recv.await.map_err(|_| AgentDaemonError::ActorStopped)
    }

    pub async fn modules(&self) -> Vec<ModuleOverview> {
        self.request(|tx_reply| AgentDaemonCommand::ModulesList { tx_reply })
            .await
            .unwrap_or_default()
    }

    pub async fn stop(&self, module_name: String) -> Result<(), AgentDaemonError> {
        self.request(|tx_reply| AgentDaemonCommand::StopModule {
            tx_reply,
            module_name,
        })
        .await?
    }

    /// Re-reads the configuration file and pushes changed sections to the modules.
    pub async fn reload_configuration(&self) -> Result<Vec<String>, AgentDaemonError> {
        self.request(|tx_reply| AgentDaemonCommand::ReloadConfiguration { tx_reply })
            .await?
    }
}

/// Status of loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    Created,
    Running(Vec<String>),
    Failed(String),
    Stopped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModuleStatus::Running(warnings) if !warnings.is_empty() => {
                write!(f, "Running([\"{}\"])", warnings.join("\",\""))
            }
            ModuleStatus::Running(_) => write!(f, "Running"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Messages used for internal communication between [`AgentDaemonHandle`] and the underlying daemon actor.
pub enum AgentDaemonCommand {
    ModulesList {
        tx_reply: oneshot::Sender<Vec<ModuleOverview>>,
    },
    StopModule {
        tx_reply: oneshot::Sender<Result<(), AgentDaemonError>>,
        module_name: String,
    },
    ReloadConfiguration {
        tx_reply: oneshot::Sender<Result<Vec<String>, AgentDaemonError>>,
    },
}

/// Overview of loaded module.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModuleOverview {
    pub name: String,
    pub version: Version,
    pub status: ModuleStatus,
}
