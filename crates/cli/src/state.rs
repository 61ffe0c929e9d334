use std::time::Duration;
use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use common::field::FieldConfig;
use common::trigger::TriggerConfig;

pub const APP_NAME: &str = "cadmus";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// On-disk configuration
///
/// The vault secret is deliberately absent: it only ever lives in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the document API
    #[serde(default = "default_remote")]
    pub remote: Url,
    /// The session user; also the salt for key derivation
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Re-fetch documents after writes and warn on mismatch
    #[serde(default)]
    pub verify_writes: bool,
    #[serde(default = "default_delay_ms")]
    pub field_debounce_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub aggregation_delay_ms: u64,
    /// Bearer token sent with every API request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_remote() -> Url {
    Url::parse("http://localhost:3000").expect("hardcoded URL must parse")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_delay_ms() -> u64 {
    1500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            user_id: None,
            log_level: default_log_level(),
            verify_writes: false,
            field_debounce_ms: default_delay_ms(),
            aggregation_delay_ms: default_delay_ms(),
            auth_token: None,
        }
    }
}

impl AppConfig {
    pub fn field_config(&self) -> FieldConfig {
        FieldConfig {
            debounce: Duration::from_millis(self.field_debounce_ms),
        }
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig::default().with_delay(Duration::from_millis(self.aggregation_delay_ms))
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the cadmus directory (~/.cadmus)
    pub cadmus_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the cadmus directory path (custom or default ~/.cadmus)
    pub fn cadmus_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new cadmus directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let cadmus_dir = Self::cadmus_dir(custom_path)?;

        if cadmus_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&cadmus_dir)?;

        let config = config.unwrap_or_default();
        let config_path = cadmus_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            cadmus_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the cadmus directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let cadmus_dir = Self::cadmus_dir(custom_path)?;

        if !cadmus_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = cadmus_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            cadmus_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("cadmus directory not initialized. Run 'cadmus init' first")]
    NotInitialized,

    #[error("cadmus directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
