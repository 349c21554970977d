// ABOUTME: Configuration types and parsing for keel.yml.
// ABOUTME: Handles YAML parsing, discovery, defaults, and building the runtime registry.

mod deserialize;

use deserialize::{deserialize_endpoints, deserialize_socket};

use crate::error::{Error, Result};
use crate::runtime::{
    DEFAULT_NAMESPACE, DEFAULT_TIMEOUT, RuntimeConfig, RuntimeKind, RuntimeRegistry, ToolPaths,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "keel.yml";
pub const CONFIG_FILENAME_ALT: &str = "keel.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".keel/config.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Per-probe timeout covering connect and confirm.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Explicit runtime; skips probing when set.
    #[serde(default)]
    pub runtime: Option<RuntimeKind>,

    #[serde(default, deserialize_with = "deserialize_socket")]
    pub socket: Option<String>,

    /// Extra candidate endpoints, appended after environment overrides.
    #[serde(default, deserialize_with = "deserialize_endpoints")]
    pub endpoints: HashMap<RuntimeKind, Vec<String>>,

    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    /// containerd namespace used for container extraction.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub tools: ToolPaths,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout: default_timeout(),
            runtime: None,
            socket: None,
            endpoints: HashMap::new(),
            env_file: default_env_file(),
            namespace: default_namespace(),
            tools: ToolPaths::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("using configuration {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like [`Config::discover`], but a directory without a config file yields defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.socket.is_some() && self.runtime.is_none() {
            return Err(Error::InvalidConfig(
                "socket is set but runtime is not".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::InvalidConfig("namespace cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Explicit runtime override, if the file names a runtime.
    pub fn runtime_override(&self) -> Option<RuntimeConfig> {
        self.runtime.map(|kind| RuntimeConfig {
            runtime: Some(kind),
            socket: self.socket.clone(),
        })
    }

    /// Candidate registry: defaults, then `lookup` overrides, then configured endpoints.
    pub fn registry<F>(&self, lookup: F) -> RuntimeRegistry
    where
        F: Fn(&str) -> Option<String>,
    {
        RuntimeRegistry::build(lookup).with_endpoints(&self.endpoints)
    }
}
