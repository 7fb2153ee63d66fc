use rekon_email::MailConfig;
use rekon_import::ClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "REKON_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub attachments_dir: PathBuf,
    /// Longest date range accepted for a single pull.
    pub max_range_days: u32,
    pub log_format: LogFormat,
    pub core_api: ClientConfig,
    pub mail: MailConfig,
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "rekon", "Rekon")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            bind: "127.0.0.1:8080".to_string(),
            database_path: data.join("rekon.db"),
            attachments_dir: data.join("attachments"),
            max_range_days: 31,
            log_format: LogFormat::Pretty,
            core_api: ClientConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    /// File named by `REKON_CONFIG` (or defaults), then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = var("REKON_BIND") {
            self.bind = bind;
        }
        if let Some(path) = var("REKON_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = var("REKON_CORE_API_URL") {
            self.core_api.base_url = url;
        }
        if let Some(token) = var("REKON_CORE_API_TOKEN") {
            self.core_api.token = Some(token).filter(|t| !t.is_empty());
        }
    }
}
