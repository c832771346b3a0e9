use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable carrying the backend base URL. Wins over `[backend].url`.
pub const BACKEND_URL_ENV: &str = "HARVEST_BACKEND_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tabs: TabsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_area")]
    pub area: String,
}

fn default_area() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// When a session's history is drained relative to the network call.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Persist drained history before the upload is attempted.
    #[default]
    Eager,
    /// Persist drained history only after the backend accepted the batch.
    OnSuccess,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub drain: DrainPolicy,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TabsConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// All-default configuration with the store under `./data`.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("./data/harvest.sqlite"),
                area: default_area(),
            },
            backend: BackendConfig::default(),
            sync: SyncConfig::default(),
            tabs: TabsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl BackendConfig {
    /// Resolves the backend base URL, environment first, without a trailing slash.
    ///
    /// Blank values count as unset.
    pub fn resolve_url(&self) -> Option<String> {
        let clean = |u: &str| {
            let u = u.trim().trim_end_matches('/');
            (!u.is_empty()).then(|| u.to_string())
        };
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .and_then(|u| clean(u.as_str()))
            .or_else(|| self.url.as_deref().and_then(clean))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.store.area.trim().is_empty() {
        anyhow::bail!("store.area must not be empty");
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    if let Some(url) = &config.backend.url {
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("backend.url must start with http:// or https://, got '{}'", url);
        }
    }

    Ok(config)
}
