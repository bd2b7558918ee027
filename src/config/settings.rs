//! Configuration settings for the intake server.

use crate::error::{ConfigError, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub scheduling: SchedulingConfig,
    pub feedback: FeedbackConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("intake.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("intake/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".intake/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        let threshold = self.classifier.confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "classifier.confidence_threshold must be in (0, 1], got {}",
                threshold
            ))
            .into());
        }

        if self.scheduling.default_duration_minutes == 0 {
            return Err(ConfigError::Invalid(
                "scheduling.default_duration_minutes must be > 0".to_string(),
            )
            .into());
        }

        if self.scheduling.max_candidates == 0 {
            return Err(
                ConfigError::Invalid("scheduling.max_candidates must be > 0".to_string()).into(),
            );
        }

        if self.scheduling.utc_offset.trim().is_empty() {
            return Err(ConfigError::MissingField("scheduling.utc_offset".to_string()).into());
        }
        self.scheduling.timezone()?;

        if self.feedback.summary_max_chars < 16 {
            return Err(ConfigError::Invalid(
                "feedback.summary_max_chars must be at least 16".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Expand the data directory path, if persistence is configured.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.as_deref().map(expand_path)
    }

    /// Expand the seed file path, if one is configured.
    pub fn seed_file(&self) -> Option<PathBuf> {
        self.storage.seed_file.as_deref().map(expand_path)
    }

    /// Expand the question bank path, if one is configured.
    pub fn question_bank(&self) -> Option<PathBuf> {
        self.feedback.question_bank.as_deref().map(expand_path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable permissive CORS for the CRM front end
    pub enable_cors: bool,
    /// Route prefix for the API
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            enable_cors: true,
            api_prefix: "/api/v1".to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the JSON snapshot; in-memory only when unset
    pub data_dir: Option<String>,
    /// JSON file with leads and properties to load at startup
    pub seed_file: Option<String>,
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this confidence the fallback label is returned
    pub confidence_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
        }
    }
}

/// Voice scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Agency timezone as a fixed UTC offset, e.g. "-05:00"
    pub utc_offset: String,
    /// Length of a booking when only a start time is spoken
    pub default_duration_minutes: u32,
    /// Agent used when neither the transcript nor the property names one
    pub default_agent_id: Option<i64>,
    /// Maximum number of candidates evaluated per transcript
    pub max_candidates: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+00:00".to_string(),
            default_duration_minutes: 30,
            default_agent_id: None,
            max_candidates: 10,
        }
    }
}

impl SchedulingConfig {
    /// Parse the configured offset.
    pub fn timezone(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse offsets of the form `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ConfigError::Invalid("utc offset".to_string()).into());
    }

    let invalid = || ConfigError::Invalid(format!("invalid utc_offset: {}", raw));

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid().into()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid().into());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid().into());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid().into())
}

/// Feedback interview configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// TOML question bank; the built-in bank is used when unset
    pub question_bank: Option<String>,
    /// Maximum length of an automatically generated summary
    pub summary_max_chars: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            question_bank: None,
            summary_max_chars: 600,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
