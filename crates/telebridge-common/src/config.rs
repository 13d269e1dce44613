//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives and utilities for the bridge runtime."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Endpoint the reference publisher binds for sensor envelopes.
pub const DEFAULT_SENSOR_ENDPOINT: &str = "tcp://localhost:5556";
/// Endpoint the reference publisher binds for advisories.
pub const DEFAULT_ADVISORY_ENDPOINT: &str = "tcp://localhost:5557";
/// Topic label carrying pose + camera envelopes.
pub const SENSOR_TOPIC: &str = "sensor_data";
/// Topic label carrying pose-only envelopes.
pub const POSE_TOPIC: &str = "pose";
/// Topic label carrying plain-text advisories.
pub const ADVISORY_TOPIC: &str = "tts";

/// Suffix value that asks for a per-process session identifier.
pub const SESSION_SUFFIX: &str = "session";

fn default_recv_timeout() -> Duration {
    Duration::from_millis(250)
}

fn default_channels() -> Vec<ChannelConfig> {
    vec![ChannelConfig::sensor(DEFAULT_SENSOR_ENDPOINT)]
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("captured_images")
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the bridge processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub subscriber: SubscriberConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// `source` is `None` when no file was found and built-in defaults apply.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "TELEBRIDGE_CONFIG";

    /// Load configuration together with the effective source path,
    /// respecting the `TELEBRIDGE_CONFIG` override.
    ///
    /// Unlike a missing candidate, an explicit `TELEBRIDGE_CONFIG` path that
    /// cannot be read is an error.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.subscriber.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Handler family a subscribed topic is routed to.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Pose plus optional camera frame.
    Sensor,
    /// Pose only.
    Pose,
    /// Raw text advisory.
    Advisory,
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sensor" => Ok(ChannelKind::Sensor),
            "pose" => Ok(ChannelKind::Pose),
            "advisory" => Ok(ChannelKind::Advisory),
            other => Err(format!("unknown channel kind: {}", other)),
        }
    }
}

/// One subscription: an endpoint to connect to and a topic to filter on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    pub endpoint: String,
    pub topic: String,
    pub kind: ChannelKind,
}

impl ChannelConfig {
    pub fn sensor(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: SENSOR_TOPIC.to_owned(),
            kind: ChannelKind::Sensor,
        }
    }

    pub fn pose(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: POSE_TOPIC.to_owned(),
            kind: ChannelKind::Pose,
        }
    }

    pub fn advisory(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: ADVISORY_TOPIC.to_owned(),
            kind: ChannelKind::Advisory,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Upper bound on a single blocking receive; also bounds shutdown latency.
    #[serde(rename = "recv_timeout_ms", default = "default_recv_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub recv_timeout: Duration,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            recv_timeout: default_recv_timeout(),
            channels: default_channels(),
        }
    }
}

impl SubscriberConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recv_timeout.is_zero() {
            return Err(anyhow!("subscriber.recv_timeout_ms must be greater than zero"));
        }
        if self.channels.is_empty() {
            return Err(anyhow!("subscriber must declare at least one channel"));
        }
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.endpoint.trim().is_empty() {
                return Err(anyhow!(
                    "channel for topic '{}' has an empty endpoint",
                    channel.topic
                ));
            }
            if channel.topic.is_empty() {
                return Err(anyhow!(
                    "channel on endpoint '{}' has an empty topic",
                    channel.endpoint
                ));
            }
            if !seen.insert(channel.topic.as_str()) {
                return Err(anyhow!("topic '{}' is declared twice", channel.topic));
            }
        }
        Ok(())
    }

    /// Distinct endpoints in declaration order.
    pub fn endpoints(&self) -> Vec<&str> {
        let mut endpoints: Vec<&str> = Vec::new();
        for channel in &self.channels {
            if !endpoints.contains(&channel.endpoint.as_str()) {
                endpoints.push(&channel.endpoint);
            }
        }
        endpoints
    }

    /// Insert or replace the channel registered for `channel.topic`.
    pub fn upsert_channel(&mut self, channel: ChannelConfig) {
        match self.channels.iter_mut().find(|c| c.topic == channel.topic) {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// `"session"` for a per-process identifier, any other value is used verbatim.
    #[serde(default)]
    pub filename_suffix: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            jpeg_quality: default_jpeg_quality(),
            filename_suffix: None,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!(
                "output.jpeg_quality must be within 1..=100 (got {})",
                self.jpeg_quality
            ));
        }
        if let Some(suffix) = &self.filename_suffix {
            let valid = !suffix.is_empty()
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(anyhow!(
                    "output.filename_suffix '{}' may only contain ASCII letters, digits, '-' and '_'",
                    suffix
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
