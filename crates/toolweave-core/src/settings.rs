//! Settings domain types, loading and validation.
//!
//! All fields are optional so a settings file only needs to mention what it
//! overrides; `effective_*` accessors supply the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ServerConfig;
use crate::ports::DEFAULT_EVENT_CAPACITY;

/// Default port for the HTTP adapter.
pub const DEFAULT_PORT: u16 = 7411;

/// Hard timeout applied to every remote-bridge command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// First retry delay of the tool executor; doubles on every attempt.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Retries performed by `execute_with_retry` when the caller does not say.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound on any retry count, configured or requested per call.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Timeout of a single HTTP request to a tool server.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// `/mcp` sessions unused for this long are closed.
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Open `/mcp` sessions kept before the least recently used is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Application settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP adapter binds to.
    pub bind_address: Option<String>,

    /// Port the HTTP adapter listens on.
    pub port: Option<u16>,

    /// Remote-bridge command timeout in seconds.
    pub command_timeout_secs: Option<u64>,

    /// Base delay of the executor's exponential backoff, in milliseconds.
    pub retry_base_delay_ms: Option<u64>,

    /// Default retry count for `execute_with_retry`.
    pub max_retries: Option<u32>,

    /// Timeout for a single HTTP request to a tool server, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: Option<usize>,

    /// Idle time after which a `/mcp` session is closed, in seconds.
    pub session_idle_timeout_secs: Option<u64>,

    /// Maximum number of open `/mcp` sessions.
    pub max_sessions: Option<usize>,

    /// Directory scanned for automation definitions at startup.
    pub definitions_dir: Option<String>,

    /// Tool servers connected at startup.
    pub servers: Vec<ServerConfig>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            bind_address: None,
            port: Some(DEFAULT_PORT),
            command_timeout_secs: Some(DEFAULT_COMMAND_TIMEOUT_SECS),
            retry_base_delay_ms: Some(DEFAULT_RETRY_BASE_DELAY_MS),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            event_channel_capacity: Some(DEFAULT_EVENT_CAPACITY),
            session_idle_timeout_secs: Some(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
            max_sessions: Some(DEFAULT_MAX_SESSIONS),
            definitions_dir: None,
            servers: Vec::new(),
        }
    }

    /// Load settings from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SettingsError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let settings: Self = serde_json::from_str(&text).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        validate_settings(&settings)?;
        tracing::debug!(path = %path.display(), servers = settings.servers.len(), "Loaded settings");
        Ok(settings)
    }

    /// Load settings from `path` if it exists, otherwise return defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            Ok(Self::with_defaults())
        }
    }

    /// Get the effective bind address.
    pub fn effective_bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or("127.0.0.1")
    }

    /// Get the effective port.
    pub const fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None => DEFAULT_PORT,
        }
    }

    /// Get the effective bridge command timeout.
    pub const fn command_timeout(&self) -> Duration {
        match self.command_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Get the effective executor backoff base delay.
    pub const fn retry_base_delay(&self) -> Duration {
        match self.retry_base_delay_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }

    /// Get the effective default retry count.
    pub const fn effective_max_retries(&self) -> u32 {
        match self.max_retries {
            Some(retries) => retries,
            None => DEFAULT_MAX_RETRIES,
        }
    }

    /// Get the effective HTTP request timeout.
    pub const fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the effective event channel capacity.
    pub const fn effective_event_capacity(&self) -> usize {
        match self.event_channel_capacity {
            Some(capacity) => capacity,
            None => DEFAULT_EVENT_CAPACITY,
        }
    }

    pub const fn session_idle_timeout(&self) -> Duration {
        match self.session_idle_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }

    pub const fn effective_max_sessions(&self) -> usize {
        match self.max_sessions {
            Some(max) => max,
            None => DEFAULT_MAX_SESSIONS,
        }
    }

    /// Retry count for one call: `requested` when given, the configured
    /// default otherwise, never above `MAX_RETRIES_LIMIT`.
    pub fn retries_for(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or_else(|| self.effective_max_retries())
            .min(MAX_RETRIES_LIMIT)
    }
}

/// Default location of the settings file (`<config dir>/toolweave/settings.json`).
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("toolweave").join("settings.json"))
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse settings file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Command timeout must be between 1 and 600 seconds, got {0}")]
    InvalidCommandTimeout(u64),

    #[error("Max retries must be at most {MAX_RETRIES_LIMIT}, got {0}")]
    InvalidMaxRetries(u32),

    #[error("Event channel capacity must be at least 1")]
    InvalidEventCapacity,

    #[error("Session idle timeout and max sessions must be at least 1")]
    InvalidSessionLimits,

    #[error("Duplicate server id in settings: {0}")]
    DuplicateServer(String),

    #[error("Invalid server '{id}': {message}")]
    InvalidServer { id: String, message: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(secs) = settings.command_timeout_secs
        && !(1..=600).contains(&secs)
    {
        return Err(SettingsError::InvalidCommandTimeout(secs));
    }

    if let Some(retries) = settings.max_retries
        && retries > MAX_RETRIES_LIMIT
    {
        return Err(SettingsError::InvalidMaxRetries(retries));
    }

    if settings.event_channel_capacity == Some(0) {
        return Err(SettingsError::InvalidEventCapacity);
    }

    if settings.session_idle_timeout_secs == Some(0) || settings.max_sessions == Some(0) {
        return Err(SettingsError::InvalidSessionLimits);
    }

    let mut seen = std::collections::HashSet::new();
    for server in &settings.servers {
        if !seen.insert(server.id.as_str()) {
            return Err(SettingsError::DuplicateServer(server.id.clone()));
        }
        server
            .validate()
            .map_err(|message| SettingsError::InvalidServer {
                id: server.id.clone(),
                message,
            })?;
    }

    Ok(())
}
