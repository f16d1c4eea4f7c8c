//! Configuration loading and data directory resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime; the server must restart to
/// pick up changes.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Directory holding database.json, backups/ and audit.log
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Admin API key (X-API-Key header)
    #[serde(default)]
    pub api_key: Option<String>,

    /// MSG91 SMS dispatch credentials (optional; OTP sends fail without them)
    #[serde(default)]
    pub msg91: Option<Msg91Config>,
}

/// MSG91 OTP API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct Msg91Config {
    pub auth_key: String,
    pub template_id: String,
}

impl TomlConfig {
    /// Load the TOML config from the default platform location, if present
    pub fn load_default() -> Result<Option<Self>> {
        let path = match default_config_file() {
            Some(p) if p.exists() => p,
            _ => return Ok(None),
        };
        let content = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Some(config))
    }
}

/// Data directory resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable FOS_DATA_DIR
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&PathBuf>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.clone();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("FOS_DATA_DIR") {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(Some(config)) = TomlConfig::load_default() {
        if let Some(dir) = config.data_dir {
            return dir;
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// Default configuration file path for the platform
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("franchiseos").join("config.toml"))
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("franchiseos"))
        .unwrap_or_else(|| PathBuf::from("./franchiseos_data"))
}
