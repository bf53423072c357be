//! Error types for tunnler-core

use thiserror::Error;

use crate::cloudflare::ApiError;

/// Errors from the tunnel lifecycle
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to provision tunnel: {0}")]
    Provision(String),

    #[error("Zone {zone} not found")]
    ZoneNotFound { zone: String },

    #[error("Record {name} has type {record_type}, refusing to overwrite it")]
    RecordTypeConflict { name: String, record_type: String },

    #[error("Record {name} not found")]
    RecordNotFound { name: String },

    #[error("cloudflared did not exit after {attempts} termination checks")]
    CloseTimeout { attempts: u32 },

    #[error("cloudflared exited unexpectedly ({})", describe_exit(*code))]
    ConnectorExit { code: Option<i32> },

    #[error("Failed to spawn cloudflared: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Cloudflare API error: {0}")]
    Api(#[from] ApiError),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "killed by signal".to_string(),
    }
}

/// Errors from loading or saving credentials
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Credentials file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credentials file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),
}
