use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{Context, Result, anyhow, bail};
use event_store::DEFAULT_QUEUE_CAPACITY;
use procguard_core::pdk::ModuleConfig;
use tokio::sync::watch;

/// Section for settings shared by the whole agent.
pub const GENERAL_CONFIG: &str = "procguard";
/// Section read by `procguard native-host`.
pub const NATIVE_HOST_CONFIG: &str = "native-host";

const APP_DIR: &str = "procguard";
const CONFIG_FILE_NAME: &str = "procguard.ini";

/// Global agent configuration manager. Contains configuration for all the modules.
///
/// It is backed by an `INI` file parsed on creation and on every [`AgentConfig::reload`].
/// Each section is published on its own [`watch`] channel.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    inner: Arc<Mutex<AgentConfigInternal>>,
}

#[derive(Debug)]
struct AgentConfigInternal {
    config_file: PathBuf,
    configs: HashMap<String, watch::Sender<ModuleConfig>>,
}

impl AgentConfig {
    /// Construct a new [`AgentConfig`] using the default file, created empty when missing.
    pub fn new() -> Result<Self> {
        let config_file = default_config_file()?;
        if !config_file.exists() {
            if let Some(prefix) = config_file.parent() {
                std::fs::create_dir_all(prefix)
                    .with_context(|| format!("Error creating {}", prefix.display()))?;
            }
            File::create(&config_file)
                .with_context(|| format!("Error creating {}", config_file.display()))?;
        }
        Self::from_config_file(config_file)
    }

    /// Construct a new [`AgentConfig`] using a custom file.
    pub fn with_custom_file(config_file: &str) -> Result<Self> {
        let config_file = PathBuf::from(config_file);
        if !config_file.exists() {
            bail!("Configuration file {} not found", config_file.display());
        }
        Self::from_config_file(config_file)
    }

    /// Uses `config_file` when given, the default file otherwise.
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        match config_file {
            Some(custom_file) => Self::with_custom_file(custom_file),
            None => Self::new(),
        }
    }

    fn from_config_file(config_file: PathBuf) -> Result<Self> {
        let configs = read_sections(&config_file)?
            .into_iter()
            .map(|(section, cfg)| {
                let (tx, _) = watch::channel(cfg);
                (section, tx)
            })
            .collect();

        Ok(Self {
            inner: Arc::new(Mutex::new(AgentConfigInternal {
                config_file,
                configs,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AgentConfigInternal> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config_file(&self) -> PathBuf {
        self.lock().config_file.clone()
    }

    /// Get [`watch::Receiver`] of a module configuration. This is intended to be used in modules.
    pub fn get_watched_module_config(&self, module: &str) -> watch::Receiver<ModuleConfig> {
        self.lock()
            .configs
            .entry(module.to_string())
            .or_insert_with(|| {
                let (tx, _) = watch::channel(ModuleConfig::default());
                tx
            })
            .subscribe()
    }

    /// Get module configuration. This is intended to be used when a single access is enough.
    pub fn get_module_config(&self, module: &str) -> Option<ModuleConfig> {
        self.lock()
            .configs
            .get(module)
            .map(|watch_sender| watch_sender.borrow().clone())
    }

    /// Re-reads the file and publishes every section whose content changed.
    ///
    /// A section removed from the file falls back to an empty configuration.
    /// Returns the names of the changed sections.
    pub fn reload(&self) -> Result<Vec<String>> {
        let mut inner = self.lock();
        let mut fresh = read_sections(&inner.config_file)?;

        let mut changed = Vec::new();
        for (section, sender) in &inner.configs {
            let new_config = fresh.remove(section).unwrap_or_default();
            if sender.send_if_modified(|current| replace_if_changed(current, new_config)) {
                changed.push(section.clone());
            }
        }
        for (section, cfg) in fresh {
            let (tx, _) = watch::channel(cfg);
            inner.configs.insert(section.clone(), tx);
            changed.push(section);
        }

        changed.sort();
        Ok(changed)
    }

    /// Directory of the database and the blocklists: `[procguard] data_dir`,
    /// `<cache dir>/procguard` otherwise.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let general = self.get_module_config(GENERAL_CONFIG).unwrap_or_default();
        match general.get_raw("data_dir") {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => dirs::cache_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| anyhow!("No cache directory available, set [procguard] data_dir")),
        }
    }

    pub fn write_queue_capacity(&self) -> Result<usize> {
        let general = self.get_module_config(GENERAL_CONFIG).unwrap_or_default();
        let capacity = general.with_default("write_queue_capacity", DEFAULT_QUEUE_CAPACITY)?;
        Ok(capacity)
    }
}

fn replace_if_changed(current: &mut ModuleConfig, new_config: ModuleConfig) -> bool {
    if *current == new_config {
        return false;
    }
    *current = new_config;
    true
}

fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or_else(|| anyhow!("No configuration directory available, use --config-file"))
}

fn read_sections(config_file: &Path) -> Result<HashMap<String, ModuleConfig>> {
    let mut configs: HashMap<String, ModuleConfig> = HashMap::new();

    let conf = ini::Ini::load_from_file(config_file)
        .with_context(|| format!("Error loading configuration from {config_file:?}"))?;

    for (section, prop) in &conf {
        if let Some(section) = section {
            let mod_config = configs.entry(section.to_string()).or_default();
            for (key, value) in prop.iter() {
                log::debug!("{}.{}={}", section, key, value);
                mod_config.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(configs)
}
