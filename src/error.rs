//! Error types for Convoy
//!
//! Uses `thiserror` for library errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Convoy operations
pub type ConvoyResult<T> = Result<T, ConvoyError>;

/// Main error type for Convoy operations
#[derive(Error, Debug)]
pub enum ConvoyError {
    /// Remote control-plane call failed (transport, auth, or API-level)
    #[error("remote API error: {0}")]
    RemoteApi(String),

    /// A required remote entity does not exist
    #[error("{kind} '{name}' not found")]
    EntityNotFound { kind: &'static str, name: String },

    /// A remote entity exists where the operation requires a fresh name
    #[error("{kind} '{name}' already exists")]
    EntityAlreadyExists { kind: &'static str, name: String },

    /// Subprocess or file-system failure while running external automation
    #[error("automation error: {0}")]
    Automation(String),

    /// Malformed procedure arguments or wrong argument counts
    #[error("validation error: {0}")]
    Validation(String),

    /// Topology file not found
    #[error("topology file not found: {path}")]
    TopologyNotFound { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}
