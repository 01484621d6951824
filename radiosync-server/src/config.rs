//! radiosync-server configuration
//!
//! Settings resolve in priority order: command-line flag, environment
//! variable (both through clap), TOML config file, compiled default.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use radiosync_common::config::{default_media_dir, TomlConfig};

use crate::acquisition::command::CommandSettings;
use crate::error::{Error, Result};
use crate::media::RegistrySettings;
use crate::playback::CoordinatorSettings;

/// Command-line arguments for radiosync-server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "radiosync-server")]
#[command(about = "Shared radio timeline server")]
#[command(version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "RADIOSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RADIOSYNC_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "RADIOSYNC_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Directory downloaded media is written to
    #[arg(short, long, env = "RADIOSYNC_MEDIA_DIR")]
    pub media_dir: Option<PathBuf>,

    /// Base URL listeners use to fetch media
    #[arg(long, env = "RADIOSYNC_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Maximum number of queued (not current) tracks
    #[arg(long, env = "RADIOSYNC_MAX_QUEUE_LENGTH")]
    pub max_queue_length: Option<usize>,

    /// Lead time between a track becoming ready and its start instant
    #[arg(long, env = "RADIOSYNC_START_LEAD_MS")]
    pub start_lead_ms: Option<u64>,

    /// yt-dlp executable
    #[arg(long, env = "RADIOSYNC_YT_DLP_PATH")]
    pub yt_dlp_path: Option<String>,

    /// ffprobe executable
    #[arg(long, env = "RADIOSYNC_FFPROBE_PATH")]
    pub ffprobe_path: Option<String>,
}

/// Acquisition backend settings
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub yt_dlp_path: String,
    pub ffprobe_path: String,
    pub max_duration_secs: u64,
    pub timeout: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            max_duration_secs: 15 * 60,
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub media_dir: PathBuf,
    pub public_base_url: String,
    pub max_queue_length: usize,
    pub start_lead_ms: u64,
    pub timesync_interval: Duration,
    pub sweep_interval: Duration,
    pub orphan_max_age: Duration,
    pub delete_retry_delay: Duration,
    pub log_level: Option<String>,
    pub acquisition: AcquisitionConfig,
}

pub const DEFAULT_PORT: u16 = 3000;

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            media_dir: default_media_dir(),
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            max_queue_length: 20,
            start_lead_ms: 5000,
            timesync_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60 * 60),
            orphan_max_age: Duration::from_secs(2 * 60 * 60),
            delete_retry_delay: Duration::from_secs(5),
            log_level: None,
            acquisition: AcquisitionConfig::default(),
        }
    }
}

impl Config {
    /// Load the config file named by `args` (or the platform default) and
    /// apply command-line/environment overrides on top
    pub fn load(args: &Args) -> Result<Self> {
        let file = TomlConfig::load(args.config.as_deref())?;
        let config = Self::merge(args, file);
        config.validate()?;
        Ok(config)
    }

    /// Layer CLI/env values over file values over defaults
    pub fn merge(args: &Args, file: TomlConfig) -> Self {
        let defaults = Self::default();
        let port = args.port.or(file.port).unwrap_or(defaults.port);

        // Locator base follows the port unless set explicitly
        let public_base_url = args
            .public_base_url
            .clone()
            .or(file.public_base_url)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let acquisition = AcquisitionConfig {
            yt_dlp_path: args
                .yt_dlp_path
                .clone()
                .or(file.acquisition.yt_dlp_path)
                .unwrap_or(defaults.acquisition.yt_dlp_path),
            ffprobe_path: args
                .ffprobe_path
                .clone()
                .or(file.acquisition.ffprobe_path)
                .unwrap_or(defaults.acquisition.ffprobe_path),
            max_duration_secs: file
                .acquisition
                .max_duration_secs
                .unwrap_or(defaults.acquisition.max_duration_secs),
            timeout: file
                .acquisition
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquisition.timeout),
        };

        Self {
            port,
            bind_address: args
                .bind_address
                .clone()
                .or(file.bind_address)
                .unwrap_or(defaults.bind_address),
            media_dir: args.media_dir.clone().or(file.media_dir).unwrap_or(defaults.media_dir),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_queue_length: args
                .max_queue_length
                .or(file.max_queue_length)
                .unwrap_or(defaults.max_queue_length),
            start_lead_ms: args
                .start_lead_ms
                .or(file.start_lead_ms)
                .unwrap_or(defaults.start_lead_ms),
            timesync_interval: file
                .timesync_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timesync_interval),
            sweep_interval: file
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            orphan_max_age: file
                .orphan_max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.orphan_max_age),
            delete_retry_delay: file
                .delete_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.delete_retry_delay),
            log_level: file.log_level,
            acquisition,
        }
    }

    /// Reject values that would stall or disable the timeline
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_length == 0 {
            return Err(Error::Config("max_queue_length must be at least 1".to_string()));
        }
        if self.timesync_interval.is_zero() {
            return Err(Error::Config("timesync_interval_ms must be positive".to_string()));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::Config("sweep_interval_secs must be positive".to_string()));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address {:?}: {}", self.bind_address, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            max_queue_length: self.max_queue_length,
            start_lead_ms: self.start_lead_ms as i64,
            public_base_url: self.public_base_url.clone(),
        }
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            media_dir: self.media_dir.clone(),
            delete_retry_delay: self.delete_retry_delay,
            sweep_interval: self.sweep_interval,
            orphan_max_age: self.orphan_max_age,
        }
    }

    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            yt_dlp_path: self.acquisition.yt_dlp_path.clone(),
            ffprobe_path: self.acquisition.ffprobe_path.clone(),
            media_dir: self.media_dir.clone(),
            max_duration_secs: self.acquisition.max_duration_secs as f64,
            timeout: self.acquisition.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = Config::merge(&Args::default(), TomlConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_queue_length, 20);
        assert_eq!(config.start_lead_ms, 5000);
        assert_eq!(config.timesync_interval, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.orphan_max_age, Duration::from_secs(7200));
        assert_eq!(config.delete_retry_delay, Duration::from_secs(5));
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.acquisition.max_duration_secs, 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = TomlConfig::from_toml_str("port = 4000\nmax_queue_length = 5\n").unwrap();
        let args = Args::parse_from(["radiosync-server", "--port", "4100"]);

        let config = Config::merge(&args, file);
        assert_eq!(config.port, 4100);
        assert_eq!(config.max_queue_length, 5);
    }

    #[test]
    fn test_public_base_url_follows_port_when_unset() {
        let args = Args::parse_from(["radiosync-server", "--port", "8080"]);
        let config = Config::merge(&args, TomlConfig::default());
        assert_eq!(config.public_base_url, "http://localhost:8080");
    }

    #[test]
    fn test_public_base_url_trailing_slash_trimmed() {
        let file = TomlConfig::from_toml_str("public_base_url = \"https://radio.example/\"\n").unwrap();
        let config = Config::merge(&Args::default(), file);
        assert_eq!(config.public_base_url, "https://radio.example");
    }

    #[test]
    fn test_validate_rejects_zero_queue_and_bad_address() {
        let mut config = Config::default();
        config.max_queue_length = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bind_address = "not-an-ip".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        let coordinator = config.coordinator_settings();
        assert_eq!(coordinator.max_queue_length, 20);
        assert_eq!(coordinator.start_lead_ms, 5000);

        let registry = config.registry_settings();
        assert_eq!(registry.media_dir, config.media_dir);
        assert_eq!(registry.orphan_max_age, Duration::from_secs(7200));

        let command = config.command_settings();
        assert_eq!(command.yt_dlp_path, "yt-dlp");
        assert_eq!(command.max_duration_secs, 900.0);
    }
}
