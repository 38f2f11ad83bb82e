//! Client configuration
//!
//! Resolution, lowest to highest precedence:
//!   1. built-in defaults
//!   2. `config.toml` (explicit path, or `<config_dir>/diagchat/config.toml`)
//!   3. `DIAGCHAT_ENDPOINT` / `DIAGCHAT_TIMEOUT_SECS`
//!   4. command-line flags (applied by the caller through the builder)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{DiagChatError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/predict/";
/// Reasoning models routinely take more than a minute
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const ENV_ENDPOINT: &str = "DIAGCHAT_ENDPOINT";
const ENV_TIMEOUT: &str = "DIAGCHAT_TIMEOUT_SECS";

/// Name of the text field in the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestField {
    #[default]
    InputText,
    Query,
}

/// Configuration for diagchat
#[derive(Debug, Clone)]
pub struct DiagChatConfig {
    /// Prediction endpoint URL
    pub endpoint: String,

    /// Whole-request timeout
    pub timeout: Duration,

    pub request_field: RequestField,

    /// Attached to every request as `telemetry_data`
    pub telemetry: Option<Value>,
}

impl Default for DiagChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            request_field: RequestField::default(),
            telemetry: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    request_field: Option<RequestField>,
    telemetry_file: Option<PathBuf>,
}

impl DiagChatConfig {
    /// Load defaults, the config file and the environment.
    ///
    /// With `path = None` the default location is tried and may be absent.
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(file) = file {
            config.apply_file(&file)?;
        }

        config.apply_env(
            std::env::var(ENV_ENDPOINT).ok(),
            std::env::var(ENV_TIMEOUT).ok(),
        )?;

        debug!(
            "Config: endpoint={}, timeout={:?}, field={:?}, telemetry={}",
            config.endpoint,
            config.timeout,
            config.request_field,
            config.telemetry.is_some()
        );
        Ok(config)
    }

    fn apply_file(&mut self, file: &Path) -> Result<()> {
        let content = std::fs::read_to_string(file)
            .map_err(|e| DiagChatError::Config(format!("cannot read {}: {e}", file.display())))?;
        let parsed: ConfigToml = toml::from_str(&content)
            .map_err(|e| DiagChatError::Config(format!("invalid {}: {e}", file.display())))?;
        info!("Loaded config from {}", file.display());

        if let Some(endpoint) = parsed.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(secs) = parsed.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(field) = parsed.request_field {
            self.request_field = field;
        }
        if let Some(telemetry_file) = parsed.telemetry_file {
            // Relative paths are relative to the config file
            let telemetry_file = match file.parent() {
                Some(dir) if telemetry_file.is_relative() => dir.join(telemetry_file),
                _ => telemetry_file,
            };
            self.telemetry = Some(load_telemetry(&telemetry_file)?);
        }
        Ok(())
    }

    fn apply_env(&mut self, endpoint: Option<String>, timeout_secs: Option<String>) -> Result<()> {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(raw) = timeout_secs {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| DiagChatError::Config(format!("{ENV_TIMEOUT} must be a number, got {raw:?}")))?;
            self.timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_field(mut self, field: RequestField) -> Self {
        self.request_field = field;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Value) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// `<config_dir>/diagchat/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("diagchat").join("config.toml"))
}

/// Read a JSON telemetry snapshot to send with each request
pub fn load_telemetry(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DiagChatError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}
