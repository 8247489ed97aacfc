use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::layout::simulation::SimulationConfig;

pub const ENV_URI: &str = "CRAWL_LOOM_URI";
pub const ENV_USER: &str = "CRAWL_LOOM_USER";
pub const ENV_PASSWORD: &str = "CRAWL_LOOM_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VizSettings {
    // Non-secret connection details; the password only ever comes from the environment
    pub store_uri: Option<String>,
    pub store_user: Option<String>,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub simulation: SimulationConfig,
    // Keep the previous graph when a fetch fails instead of clearing it
    pub retain_on_failure: bool,
    // Crawled-dataset payload shown by the list views
    pub dataset_path: Option<PathBuf>,
}

impl Default for VizSettings {
    fn default() -> Self {
        Self {
            store_uri: None,
            store_user: None,
            viewport_width: 800.0,
            viewport_height: 600.0,
            simulation: SimulationConfig::default(),
            retain_on_failure: false,
            dataset_path: None,
        }
    }
}

/// Resolved endpoint and credentials for the graph store.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip)]
    password: String,
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self { uri: uri.into(), user: user.into(), password: password.into() }
    }

    pub fn password(&self) -> &str { &self.password }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl VizSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Crawl-Loom
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Crawl-Loom");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Crawl-Loom
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Crawl-Loom");
            }
            return PathBuf::from("Crawl-Loom");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Crawl-Loom or ~/.config/Crawl-Loom
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Crawl-Loom");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Crawl-Loom");
        }
    }

    /// settings.json in the per-user config directory.
    pub fn settings_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let mut f = fs::File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let v: Self = serde_json::from_str(&s)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        Ok(v)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Resolve connection details from the process environment.
    pub fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        self.connection_config_with(|key| std::env::var(key).ok())
    }

    // Environment wins over the settings file; the password has no file fallback
    pub fn connection_config_with<F>(&self, lookup: F) -> anyhow::Result<ConnectionConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let uri = non_empty(ENV_URI)
            .or_else(|| self.store_uri.clone())
            .ok_or_else(|| anyhow!("graph store endpoint missing: set {} or store_uri", ENV_URI))?;
        let user = non_empty(ENV_USER)
            .or_else(|| self.store_user.clone())
            .unwrap_or_else(|| "neo4j".to_string());
        let password = non_empty(ENV_PASSWORD)
            .ok_or_else(|| anyhow!("graph store password missing: set {}", ENV_PASSWORD))?;
        Ok(ConnectionConfig::new(uri, user, password))
    }
}
