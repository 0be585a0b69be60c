// In: src/config.rs

//! The single source of truth for bridge configuration.
//!
//! Two layers live here:
//! - `ServerConfig` is created once at the process boundary (CLI or JSON file)
//!   and decides where the server listens and how loudly it logs to stderr.
//! - `SessionLogConfig` is decoded from the `conf` channel during `open` and
//!   describes the per-session log file the remote caller asked for.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::marshal::ScalarValue;

//==================================================================================
// I. Server Configuration
//==================================================================================

/// Process-level configuration for the bridge server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host name the transport binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the transport binds to. `0` lets the transport pick one.
    #[serde(default)]
    pub port: u16,

    /// Stderr log level, using the same names the `conf` channel accepts.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// If true, the advertised location uses the TLS scheme.
    #[serde(default)]
    pub tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            log_level: default_log_level(),
            tls: false,
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// The URI a client uses to reach this server.
    pub fn location(&self) -> String {
        let scheme = if self.tls { "grpc+tls" } else { "grpc+tcp" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        parse_level(&self.log_level)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

//==================================================================================
// II. Bootstrap Arguments
//==================================================================================

/// The command-line surface of the bridge process: `<port> <udf-path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapArgs {
    pub port: u16,
    pub udf_path: PathBuf,
}

impl BootstrapArgs {
    /// Parses from a full argv-style iterator; the program name is skipped.
    /// Trailing arguments are ignored.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into).skip(1);

        let port_raw = args
            .next()
            .ok_or_else(|| BridgeError::InvalidConfiguration("missing <port> argument".into()))?;
        let port = port_raw.parse::<u16>().map_err(|e| {
            BridgeError::InvalidConfiguration(format!("invalid port {:?}: {}", port_raw, e))
        })?;

        let udf_path = args.next().map(PathBuf::from).ok_or_else(|| {
            BridgeError::InvalidConfiguration("missing <udf-path> argument".into())
        })?;

        Ok(Self { port, udf_path })
    }

    /// Folds the CLI values over a base configuration.
    pub fn apply_to(&self, mut config: ServerConfig) -> ServerConfig {
        config.port = self.port;
        config
    }
}

//==================================================================================
// III. Session Log Configuration (decoded from the `conf` channel)
//==================================================================================

/// Where and how verbosely the session log file is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLogConfig {
    pub log_dir: PathBuf,
    pub level: LevelFilter,
}

impl SessionLogConfig {
    /// Decodes the positional `conf` values: `[log_dir, log_level]`.
    pub fn from_values(values: &[ScalarValue]) -> Result<Self> {
        let log_dir = match values.first() {
            Some(ScalarValue::Utf8(dir)) => PathBuf::from(dir),
            Some(other) => {
                return Err(BridgeError::InvalidConfiguration(format!(
                    "log directory must be a string, got {}",
                    other
                )))
            }
            None => {
                return Err(BridgeError::InvalidConfiguration(
                    "conf channel carries no log directory".into(),
                ))
            }
        };

        let level = match values.get(1) {
            Some(ScalarValue::Utf8(level)) => parse_level(level)?,
            Some(other) => {
                return Err(BridgeError::InvalidConfiguration(format!(
                    "log level must be a string, got {}",
                    other
                )))
            }
            None => LevelFilter::Info,
        };

        Ok(Self { log_dir, level })
    }
}

/// Maps the caller's level vocabulary onto `log` filters.
pub fn parse_level(name: &str) -> Result<LevelFilter> {
    match name.trim().to_ascii_uppercase().as_str() {
        "NOTSET" | "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARNING" | "WARN" => Ok(LevelFilter::Warn),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(BridgeError::InvalidConfiguration(format!(
            "unknown log level {:?}",
            name
        ))),
    }
}
