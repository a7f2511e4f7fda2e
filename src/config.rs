//! Layered service configuration.
//!
//! Values resolve file → environment → CLI: an optional `atelier.toml` is
//! read first, `ATELIER_*` environment variables override it, and CLI flags
//! (applied by the caller) win over both.
//!
//! ```toml
//! [server]
//! port = 8080
//! storage_dir = "storage"
//! dev = false
//!
//! [pipeline]
//! max_retries = 3
//! stage_timeout_secs = 300
//!
//! [backends]
//! brand_kit_url = "http://127.0.0.1:9101/extract"
//! generation_url = "http://127.0.0.1:9102/generate"
//! critique_url = "http://127.0.0.1:9103/critique"
//! refinement_url = "http://127.0.0.1:9104/refine"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub storage_dir: PathBuf,
    /// Permissive CORS for a local frontend dev server.
    pub dev: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            storage_dir: PathBuf::from("storage"),
            dev: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Hard ceiling on critique-driven loop-back transitions per run.
    pub max_retries: u32,
    /// Per-stage request deadline; a stalled backend call fails the run
    /// instead of blocking it forever.
    pub stage_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            stage_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub brand_kit_url: String,
    pub generation_url: String,
    pub critique_url: String,
    pub refinement_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            brand_kit_url: "http://127.0.0.1:9101/extract".to_string(),
            generation_url: "http://127.0.0.1:9102/generate".to_string(),
            critique_url: "http://127.0.0.1:9103/critique".to_string(),
            refinement_url: "http://127.0.0.1:9104/refine".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub pipeline: PipelineSettings,
    pub backends: BackendSettings,
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file (if present), then
    /// `ATELIER_*` environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("atelier.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Overlay `ATELIER_*` variables from a lookup function. Malformed
    /// numeric values are ignored rather than fatal.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("ATELIER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("ATELIER_STORAGE_DIR") {
            self.server.storage_dir = PathBuf::from(dir);
        }
        if let Some(dev) = lookup("ATELIER_DEV") {
            self.server.dev = dev != "false" && dev != "0";
        }
        if let Some(n) = lookup("ATELIER_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.pipeline.max_retries = n;
        }
        if let Some(n) = lookup("ATELIER_STAGE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.pipeline.stage_timeout_secs = n;
        }
        if let Some(url) = lookup("ATELIER_BRAND_KIT_URL") {
            self.backends.brand_kit_url = url;
        }
        if let Some(url) = lookup("ATELIER_GENERATION_URL") {
            self.backends.generation_url = url;
        }
        if let Some(url) = lookup("ATELIER_CRITIQUE_URL") {
            self.backends.critique_url = url;
        }
        if let Some(url) = lookup("ATELIER_REFINEMENT_URL") {
            self.backends.refinement_url = url;
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
