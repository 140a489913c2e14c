use std::{borrow::Cow, fmt, future::Future, ops::Deref};

use semver::Version;
use serde::{Deserialize, Serialize};

use super::{ConfigError, ModuleConfig, ModuleContext};

pub type ModuleError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Raised by a module task to its manager.
pub enum ModuleSignal {
    Warning(String),
    Error(ModuleError),
}

/// Trait implemented by every agent module.
///
/// A module is a long running loop owned by the daemon: `trigger` waits for
/// the next reason to work (usually an interval tick), `action` does the work.
/// Configuration updates are delivered through `on_config_change` and
/// `graceful_stop` runs when the daemon stops the module.
pub trait AgentModule: Send + Sync + 'static {
    type Config: for<'a> TryFrom<&'a ModuleConfig, Error = ConfigError> + Send + Sync + 'static;
    type State: Send + 'static;
    type Extension: Send + 'static;
    type TriggerOutput: Send + Sync + 'static;

    const MODULE_NAME: &'static str;
    const DEFAULT_ENABLED: bool;

    fn init_state(
        &self,
        config: &Self::Config,
        ctx: &ModuleContext,
    ) -> impl Future<Output = Result<(Self::State, Self::Extension), ModuleError>> + Send;

    fn trigger(
        extension: &mut Self::Extension,
    ) -> impl Future<Output = Result<Self::TriggerOutput, ModuleError>> + Send;

    fn action(
        trigger_output: &Self::TriggerOutput,
        config: &Self::Config,
        state: &mut Self::State,
        ctx: &ModuleContext,
    ) -> impl Future<Output = Result<(), ModuleError>> + Send;

    fn on_config_change(
        _new_config: &Self::Config,
        _state: &mut Self::State,
        _extension: &mut Self::Extension,
        _ctx: &ModuleContext,
    ) -> impl Future<Output = Result<(), ModuleError>> + Send {
        async { Ok(()) }
    }

    fn graceful_stop(
        _state: Self::State,
        _ctx: &ModuleContext,
    ) -> impl Future<Output = Result<(), ModuleError>> + Send {
        async { Ok(()) }
    }

    fn name(&self) -> ModuleName {
        Self::MODULE_NAME.into()
    }

    fn details(&self) -> ModuleDetails {
        ModuleDetails {
            version: Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version::new(0, 0, 0)),
            enabled_by_default: Self::DEFAULT_ENABLED,
        }
    }
}

/// Configuration for modules without settings.
#[derive(Debug, Clone, Default)]
pub struct NoConfig;

impl TryFrom<&ModuleConfig> for NoConfig {
    type Error = ConfigError;

    fn try_from(_config: &ModuleConfig) -> Result<Self, Self::Error> {
        Ok(NoConfig)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleName(Cow<'static, str>);

impl Deref for ModuleName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&'static str> for ModuleName {
    fn from(val: &'static str) -> ModuleName {
        ModuleName(Cow::Borrowed(val))
    }
}

impl From<String> for ModuleName {
    fn from(val: String) -> ModuleName {
        ModuleName(Cow::Owned(val))
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contains module informations
#[derive(Debug, Clone)]
pub struct ModuleDetails {
    pub version: Version,
    pub enabled_by_default: bool,
}
