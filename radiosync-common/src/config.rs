//! Configuration file loading
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns layer 3: locating the TOML file and parsing it into a
//! struct where every key is optional. A missing file is not an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "radiosync";

/// Contents of `config.toml`
///
/// All fields are optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub media_dir: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub max_queue_length: Option<usize>,
    pub start_lead_ms: Option<u64>,
    pub timesync_interval_ms: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub orphan_max_age_secs: Option<u64>,
    pub delete_retry_delay_ms: Option<u64>,
    pub log_level: Option<String>,
    pub acquisition: AcquisitionToml,
}

/// `[acquisition]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionToml {
    pub yt_dlp_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub max_duration_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Parse config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load the config file
    ///
    /// With an explicit path the file must exist and parse. Without one the
    /// platform locations are probed and a missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
            })?;
            return Self::from_toml_str(&text);
        }

        match find_config_file() {
            Some(path) => {
                debug!("Loading config file {}", path.display());
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&text)
            }
            None => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Candidate config file locations, most specific first
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR_NAME).join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml"));
    }
    candidates
}

fn find_config_file() -> Option<PathBuf> {
    config_file_candidates().into_iter().find(|p| p.exists())
}

/// Default directory for downloaded media
pub fn default_media_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR_NAME)
}
