// In: src/error.rs

//! This module defines the single, unified error type for the entire bridge.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

/// The error type a user operator hands back from any lifecycle method.
pub type UdfError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    // =========================================================================
    // === Session Protocol Errors
    // =========================================================================
    /// A required channel key is absent from the batch store.
    #[error("Flight not found: {key}")]
    NotFound { key: String },

    #[error("Unknown action {0:?}")]
    UnknownAction(String),

    /// Anything raised by the wrapped user operator.
    #[error("User function failed during '{stage}': {source}")]
    UserFunction {
        stage: &'static str,
        #[source]
        source: UdfError,
    },

    #[error("Action '{action}' is not allowed in lifecycle state '{state}'")]
    InvalidState { action: String, state: String },

    // =========================================================================
    // === Data & Configuration Errors
    // =========================================================================
    #[error("Row marshalling failed: {0}")]
    Marshalling(String),

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Shutdown hand-off failed: {0}")]
    Shutdown(String),

    /// The serve loop is gone or dropped the reply channel.
    #[error("Transport failure: {0}")]
    Transport(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem (e.g., log file creation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically for tickets and status payloads.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl BridgeError {
    /// Wraps an operator error with the lifecycle stage it surfaced from.
    pub fn user_function(stage: &'static str, source: UdfError) -> Self {
        BridgeError::UserFunction { stage, source }
    }

    /// Renders the error and its full `source()` chain, one cause per line.
    /// This is the trace carried in a failed compute status.
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str("\nCaused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}
