//! Configuration module for the Intervox Gateway server.
//!
//! Configuration comes from three layers with the priority
//! YAML file > environment variables > defaults. A `.env` file, when
//! present, is loaded into the environment before any of this runs.
//!
//! # Example
//! ```rust,no_run
//! use intervox_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // YAML file with environment variable fallback
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::core::live::GeminiLiveModel;

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
const DEFAULT_PORT: u16 = 8080;

/// Default path of the durable result slot.
const DEFAULT_RESULT_STORE_PATH: &str = "data/last_feedback.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric variable did not parse
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// TLS needs both a certificate and a key
    #[error("TLS configuration requires both TLS_CERT_PATH and TLS_KEY_PATH")]
    PartialTls,

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// TLS configuration for HTTPS and WSS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// TLS configuration (optional)
    pub tls: Option<TlsConfig>,
    /// Gemini API key; sessions cannot start without one
    pub gemini_api_key: Option<String>,
    /// Model used when a client does not pick one
    pub default_model: GeminiLiveModel,
    /// Path of the durable result slot
    pub result_store_path: PathBuf,
    /// CORS allowed origins (comma-separated list or "*" for all);
    /// `None` means same-origin only
    pub cors_allowed_origins: Option<String>,
}

/// Optional overrides loaded from a YAML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    host: Option<String>,
    port: Option<u16>,
    tls_cert_path: Option<PathBuf>,
    tls_key_path: Option<PathBuf>,
    gemini_api_key: Option<String>,
    default_model: Option<String>,
    result_store_path: Option<PathBuf>,
    cors_allowed_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(YamlConfig::default())
    }

    /// Load configuration from a YAML file, with environment variables
    /// filling anything the file leaves out.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let yaml: YamlConfig = serde_yaml::from_str(&raw)?;
        Self::build(yaml)
    }

    fn build(yaml: YamlConfig) -> Result<Self, ConfigError> {
        let host = yaml
            .host
            .or_else(|| env_var("HOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match yaml.port {
            Some(port) => port,
            None => match env_var("PORT") {
                Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "PORT",
                    value: raw,
                })?,
                None => DEFAULT_PORT,
            },
        };

        let cert_path = yaml
            .tls_cert_path
            .or_else(|| env_var("TLS_CERT_PATH").map(PathBuf::from));
        let key_path = yaml
            .tls_key_path
            .or_else(|| env_var("TLS_KEY_PATH").map(PathBuf::from));
        let tls = match (cert_path, key_path) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        let gemini_api_key = yaml.gemini_api_key.or_else(|| env_var("GEMINI_API_KEY"));

        let default_model = yaml
            .default_model
            .or_else(|| env_var("GEMINI_LIVE_MODEL"))
            .map(|s| GeminiLiveModel::from_str_or_default(&s))
            .unwrap_or_default();

        let result_store_path = yaml
            .result_store_path
            .or_else(|| env_var("RESULT_STORE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_STORE_PATH));

        let cors_allowed_origins = yaml
            .cors_allowed_origins
            .or_else(|| env_var("CORS_ALLOWED_ORIGINS"));

        Ok(Self {
            host,
            port,
            tls,
            gemini_api_key,
            default_model,
            result_store_path,
            cors_allowed_origins,
        })
    }

    /// The socket address string to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS is configured.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
