mod types;

pub use types::{AssistantConfig, Config, ConfigIssue, MediaConfig, NotchConfig, TimingsConfig};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

pub type SharedConfig = Arc<RwLock<Config>>;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("notchify")
        .join(CONFIG_FILE_NAME)
}

pub fn load_config() -> Config {
    load_config_from(&get_config_path())
}

/// Loads and validates the config; any error falls back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    let config = if path.exists() {
        match read_config(path) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::error!("{}", e);
                Config::default()
            }
        }
    } else {
        log::info!("No config file found at {:?}, using defaults", path);
        Config::default()
    };

    let issues = config.validate();
    let errors: Vec<_> = issues.iter().filter(|i| i.is_error).collect();
    let warnings: Vec<_> = issues.iter().filter(|i| !i.is_error).collect();

    for warning in &warnings {
        log::warn!("Config: {}", warning);
    }
    for error in &errors {
        log::error!("Config: {}", error);
    }

    if !errors.is_empty() {
        log::error!(
            "Config has {} error(s); falling back to defaults.",
            errors.len()
        );
        // Keep the profile selection and onboarding flag, they are validated separately.
        return Config {
            notch: config.notch,
            ..Config::default()
        };
    }

    config
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(&get_config_path(), config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved config to {:?}", path);
    Ok(())
}

/// Records an explicit profile choice, which also completes onboarding.
pub fn persist_profile(config: &SharedConfig, profile_id: &str) -> Result<(), ConfigError> {
    let snapshot = {
        let mut guard = match config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.notch.profile = Some(profile_id.to_string());
        guard.notch.onboarding_complete = true;
        guard.clone()
    };
    save_config(&snapshot)
}

pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<Result<Event, notify::Error>>,
    path: PathBuf,
    config: SharedConfig,
    last_reload: Mutex<Instant>,
}

impl ConfigWatcher {
    pub fn new(config: SharedConfig) -> Result<Self, notify::Error> {
        Self::with_path(config, get_config_path())
    }

    pub fn with_path(config: SharedConfig, path: PathBuf) -> Result<Self, notify::Error> {
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        // Watch the directory so editors that replace the file are still seen
        let config_dir = path.parent().unwrap_or(&path).to_path_buf();
        if !config_dir.exists() {
            let _ = std::fs::create_dir_all(&config_dir);
        }

        watcher.watch(&config_dir, RecursiveMode::NonRecursive)?;
        log::info!("Watching config directory: {:?}", config_dir);

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path,
            config,
            last_reload: Mutex::new(Instant::now()),
        })
    }

    /// Check for config changes and reload if needed. Returns true if config was reloaded.
    pub fn check_and_reload(&self) -> bool {
        let mut should_reload = false;

        while let Ok(event) = self.receiver.try_recv() {
            match event {
                Ok(event) => {
                    let is_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == self.path.file_name());

                    if is_config && (event.kind.is_modify() || event.kind.is_create()) {
                        should_reload = true;
                    }
                }
                Err(e) => {
                    log::error!("Config watch error: {}", e);
                }
            }
        }

        if !should_reload {
            return false;
        }

        let now = Instant::now();
        let elapsed = self
            .last_reload
            .lock()
            .map(|t| now.duration_since(*t))
            .unwrap_or(Duration::ZERO);
        if elapsed <= Duration::from_millis(500) {
            return false;
        }

        log::info!("Config file changed, reloading...");
        let new_config = load_config_from(&self.path);
        if let Ok(mut cfg) = self.config.write() {
            if *cfg == new_config {
                return false;
            }
            *cfg = new_config;
            if let Ok(mut t) = self.last_reload.lock() {
                *t = now;
            }
            return true;
        }

        false
    }
}
