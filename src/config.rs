//! Application configuration
//!
//! Defaults are embedded from `config.toml`. `LIPREAD_CONFIG` names a file that
//! replaces them, and `LIPREAD_BACKEND_URL` overrides the backend location.

use crate::camera::{FacingMode, MediaConstraints};
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Environment variable naming an alternative config file
const CONFIG_PATH_ENV: &str = "LIPREAD_CONFIG";

/// Environment variable overriding `backend.url`
const BACKEND_URL_ENV: &str = "LIPREAD_BACKEND_URL";

const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    pub(crate) backend: BackendConfig,
    pub(crate) camera: CameraConfig,
    pub(crate) sampling: SamplingConfig,
    pub(crate) display: DisplayConfig,
}

/// Inference backend location
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BackendConfig {
    pub(crate) url: String,
    /// Clear the backend's frame history whenever a session goes live
    #[serde(default)]
    pub(crate) reset_on_start: bool,
}

/// Which camera implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CameraBackend {
    Synthetic,
    V4l2,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CameraConfig {
    pub(crate) backend: CameraBackend,
    /// Device node, only used by the V4L2 backend
    pub(crate) device: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) facing_mode: FacingMode,
}

impl CameraConfig {
    pub(crate) fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            width: self.width,
            height: self.height,
            facing_mode: self.facing_mode,
            audio: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SamplingConfig {
    pub(crate) interval_ms: u64,
    pub(crate) jpeg_quality: u8,
    /// Skip ticks while this many inference calls are outstanding.
    /// Unset means ticks never wait on earlier calls.
    #[serde(default)]
    pub(crate) max_in_flight: Option<usize>,
}

impl SamplingConfig {
    pub(crate) fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DisplayConfig {
    pub(crate) error_display_secs: u64,
    pub(crate) history_limit: usize,
}

impl DisplayConfig {
    pub(crate) fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub(crate) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.backend.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.backend.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.backend.url.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        if self.sampling.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sampling.interval_ms must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.sampling.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "sampling.jpeg_quality must be within 1..=100, got {}",
                self.sampling.jpeg_quality
            )));
        }
        if self.sampling.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid(
                "sampling.max_in_flight must be greater than zero when set".into(),
            ));
        }
        if self.display.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "display.history_limit must be greater than zero".into(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera size must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        Ok(())
    }
}

/// Load configuration from the embedded defaults, `LIPREAD_CONFIG` and the environment
pub(crate) fn load_config() -> Result<Config, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => {
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            info!(path = %path, "Loading configuration file");
            Config::from_toml(&contents)?
        }
        Err(_) => Config::from_toml(DEFAULT_CONFIG_TOML)?,
    };

    config.apply_backend_override(std::env::var(BACKEND_URL_ENV).ok())?;
    Ok(config)
}

impl Config {
    /// Replace `backend.url` with `url`, if given, and re-validate
    fn apply_backend_override(&mut self, url: Option<String>) -> Result<(), ConfigError> {
        let Some(url) = url else {
            return Ok(());
        };
        info!(url = %url, "Backend URL overridden from environment");
        self.backend.url = url;
        self.validate()
    }
}
