//! TOML configuration.
//!
//! Holds the logical project map, emulator endpoints, store tuning, and the
//! HTTP bind address. See `config/folio.example.toml` for a full example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use folio_core::{DEFAULT_CHUNK_SIZE, MAX_BATCH_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Project used when a caller does not name one.
    #[serde(default)]
    pub default_project: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub emulators: EmulatorsConfig,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

/// Connection settings for one logical project.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub measurement_id: Option<String>,
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
    "127.0.0.1:3333".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            chunk_size: default_chunk_size(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmulatorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_firestore_endpoint")]
    pub firestore: Endpoint,
    #[serde(default = "default_auth_endpoint")]
    pub auth: Endpoint,
}

impl Default for EmulatorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            firestore: default_firestore_endpoint(),
            auth: default_auth_endpoint(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_firestore_endpoint() -> Endpoint {
    Endpoint::new("localhost", 8080)
}
fn default_auth_endpoint() -> Endpoint {
    Endpoint::new("localhost", 9099)
}

impl Config {
    /// Single-project configuration on the in-memory backend.
    pub fn in_memory(project_key: &str) -> Self {
        let mut projects = BTreeMap::new();
        projects.insert(
            project_key.to_string(),
            ProjectConfig {
                api_key: String::new(),
                auth_domain: String::new(),
                project_id: project_key.to_string(),
                storage_bucket: String::new(),
                messaging_sender_id: String::new(),
                app_id: String::new(),
                measurement_id: None,
            },
        );
        Self {
            default_project: None,
            server: ServerConfig::default(),
            store: StoreConfig {
                backend: BackendKind::Memory,
                ..StoreConfig::default()
            },
            emulators: EmulatorsConfig::default(),
            projects,
        }
    }

    /// The configured default project, otherwise the first key in order.
    pub fn default_project_key(&self) -> Option<&str> {
        self.default_project
            .as_deref()
            .or_else(|| self.projects.keys().next().map(String::as_str))
    }

    /// Apply the validation rules `load_config` enforces.
    pub fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            anyhow::bail!("at least one [projects.<key>] table is required");
        }

        for (key, project) in &self.projects {
            if project.project_id.trim().is_empty() {
                anyhow::bail!("projects.{}.project_id must not be empty", key);
            }
        }

        if let Some(default) = &self.default_project {
            if !self.projects.contains_key(default) {
                anyhow::bail!(
                    "default_project '{}' is not a configured project. Known: {}",
                    default,
                    self.projects.keys().cloned().collect::<Vec<_>>().join(", ")
                );
            }
        }

        if !(1..=MAX_BATCH_SIZE).contains(&self.store.chunk_size) {
            anyhow::bail!("store.chunk_size must be in [1, {}]", MAX_BATCH_SIZE);
        }

        if self.store.poll_interval_ms == 0 {
            anyhow::bail!("store.poll_interval_ms must be > 0");
        }

        if self.emulators.firestore.port == 0 || self.emulators.auth.port == 0 {
            anyhow::bail!("emulator ports must be non-zero");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[projects.personal-project]
project_id = "personal-project"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3333");
        assert_eq!(config.store.backend, BackendKind::Rest);
        assert_eq!(config.store.chunk_size, 450);
        assert!(config.emulators.enabled);
        assert_eq!(config.emulators.firestore, Endpoint::new("localhost", 8080));
        assert_eq!(config.emulators.auth.url(), "http://localhost:9099");
        assert_eq!(config.default_project_key(), Some("personal-project"));
    }

    #[test]
    fn first_key_is_default_when_unset() {
        let config = parse_config(
            r#"
[projects.zeta]
project_id = "z"
[projects.alpha]
project_id = "a"
"#,
        )
        .unwrap();
        assert_eq!(config.default_project_key(), Some("alpha"));
    }

    #[test]
    fn empty_project_map_is_rejected() {
        let err = parse_config("[server]\nbind = \"0.0.0.0:1\"\n").unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn blank_project_id_is_rejected() {
        assert!(parse_config("[projects.a]\nproject_id = \" \"\n").is_err());
    }

    #[test]
    fn in_memory_config_is_valid() {
        let config = Config::in_memory("demo");
        config.validate().unwrap();
        assert_eq!(config.store.backend, BackendKind::Memory);
        assert_eq!(config.default_project_key(), Some("demo"));
    }
}
