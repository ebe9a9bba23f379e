//! Server configuration.
//!
//! Loaded once at startup from a YAML file (path in `LANTERN_CONFIG`) and
//! never mutated afterwards. Every field has a default, so an empty or
//! missing file yields a working server. `LISTEN` overrides the listen
//! address.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Seconds to wait for the first bytes of a request, and for the peer
    /// to accept each response write.
    pub timeout_secs: u64,
    /// Seconds to wait for the next request on a kept-alive connection.
    pub keepalive_timeout_secs: u64,
    /// Requests served on one connection before it is closed.
    pub keepalive_max_requests: u32,
    /// Connections served at the same time.
    pub max_connections: usize,
    /// Upper bound on the size of a request line plus headers.
    pub max_request_head: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            timeout_secs: 15,
            keepalive_timeout_secs: 15,
            keepalive_max_requests: 30,
            max_connections: 64,
            max_request_head: 8192,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub document_root: PathBuf,
    /// Served in place of a listing when present in a directory.
    pub default_documents: Vec<String>,
    /// Render listings for directories without a default document.
    pub listing: bool,
    /// Extension to media type additions, e.g. `md: text/markdown`.
    pub mime_types: HashMap<String, String>,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            default_documents: ["index.html", "index.htm", "INDEX.HTM", "INDEX.HTML"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            listing: true,
            mime_types: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Access log file; requests are not logged when unset.
    pub access_log: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("invalid configuration")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Reads `LANTERN_CONFIG` (if set) and applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os("LANTERN_CONFIG") {
            Some(path) if Path::new(&path).exists() => Self::from_file(Path::new(&path))?,
            Some(path) => {
                tracing::warn!("Config file {} not found, using defaults", Path::new(&path).display());
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }
}
