//! CLI configuration: server location, filter storage, session tuning.
//!
//! Read from `<config dir>/gfxs/config.json` when present. `GFXS_SERVER`
//! overrides the file; command-line flags override both.

use anyhow::{Context, Result};
use gfxs_api::FilterStore;
use gfxs_client::HttpBackend;
use gfxs_kernel::{DirFilterStore, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::Args;

pub const DEFAULT_SERVER: &str = "http://localhost:8080";
pub const SERVER_ENV: &str = "GFXS_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfxsConfig {
    pub server: String,

    /// Local filter directory; filters live on the server when unset.
    pub filters_dir: Option<PathBuf>,

    #[serde(flatten)]
    pub session: SessionConfig,
}

impl Default for GfxsConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            filters_dir: None,
            session: SessionConfig::default(),
        }
    }
}

impl GfxsConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gfxs").join("config.json"))
    }

    /// Load from `path`, or from the default location if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        config
            .session
            .validate()
            .with_context(|| format!("invalid config '{}'", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `GFXS_SERVER` and command-line overrides.
    pub fn with_overrides(mut self, env_server: Option<String>, args: &Args) -> Self {
        if let Some(server) = env_server.filter(|s| !s.trim().is_empty()) {
            self.server = server;
        }
        if let Some(server) = &args.server {
            self.server = server.clone();
        }
        if let Some(dir) = &args.filters_dir {
            self.filters_dir = Some(dir.clone());
        }
        self
    }

    pub fn backend(&self) -> Result<Arc<HttpBackend>> {
        let backend = HttpBackend::with_timeout(&self.server, self.session.request_timeout)
            .with_context(|| format!("server '{}'", self.server))?;
        Ok(Arc::new(backend))
    }

    /// Filter storage: the local directory when configured, else the server.
    pub fn filter_store(&self, backend: Arc<HttpBackend>) -> Arc<dyn FilterStore> {
        match &self.filters_dir {
            Some(dir) => Arc::new(DirFilterStore::new(dir.clone())),
            None => backend,
        }
    }
}
