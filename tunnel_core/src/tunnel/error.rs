//! Error types for the tunnel module.

use std::io;
use thiserror::Error;

use super::runner::RunnerError;
use super::store::StoreError;
use super::types::TunnelState;
use crate::conf::ConfigParseError;
use crate::keyed::RegistryError;

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;

/// Error types that can occur in tunnel operations.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The wg tooling could not be found or made available
    #[error("WireGuard tools unavailable: {0}")]
    ToolingUnavailable(String),

    /// The helper exited with a non-zero status
    #[error("Unable to bring tunnel {name} {state} (exit code {exit_code})")]
    Apply {
        name: String,
        state: TunnelState,
        exit_code: i32,
    },

    /// Applying failed and re-applying the previous configuration failed too
    #[error("{primary}; rolling back also failed: {secondary}")]
    RollbackFailed {
        name: String,
        primary: Box<TunnelError>,
        secondary: Box<TunnelError>,
    },

    /// The tunnel has no configuration loaded
    #[error("Tunnel has no configuration: {0}")]
    MissingConfig(String),

    /// Name does not satisfy the naming rules
    #[error("Invalid tunnel name: {0}")]
    InvalidName(String),

    /// Tunnel already exists
    #[error("Tunnel already exists: {0}")]
    AlreadyExists(String),

    /// Tunnel not found
    #[error("Tunnel not found: {0}")]
    NotFound(String),

    /// The backend version could not be determined
    #[error("Unable to determine backend version")]
    Version,

    /// A privileged command could not be run at all
    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Configuration or state store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Registry invariant violated
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Malformed configuration text
    #[error("Configuration error: {0}")]
    ConfigParse(#[from] ConfigParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blocking worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failed_message() {
        let err = TunnelError::RollbackFailed {
            name: "wg0".to_string(),
            primary: Box::new(TunnelError::Apply {
                name: "wg0".to_string(),
                state: TunnelState::Up,
                exit_code: 1,
            }),
            secondary: Box::new(TunnelError::Apply {
                name: "wg0".to_string(),
                state: TunnelState::Up,
                exit_code: 2,
            }),
        };
        let message = err.to_string();
        assert!(message.contains("exit code 1"));
        assert!(message.contains("exit code 2"));
    }
}
