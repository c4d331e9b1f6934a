//! # Error Types
//!
//! Custom error types for DualShock Bridge using `thiserror`.
//!
//! Read hiccups and device loss during a session are deliberately absent here:
//! the event source reports them as [`ReadOutcome`](crate::controller::device::ReadOutcome)
//! values so they never reach the caller.

use thiserror::Error;

/// Main error type for DualShock Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No supported (non-companion) controller is connected
    #[error("No supported controller found")]
    DeviceNotFound,

    /// Mapping requested for a controller family with no loaded profile
    #[error("Unknown controller profile: {0}")]
    UnknownProfile(String),

    /// Profile document that cannot be resolved into a capability table
    #[error("Malformed controller profile: {0}")]
    MalformedProfile(String),

    /// Configuration errors (parse and validation)
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial transport errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Wire text that does not decode into a frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON status output errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for DualShock Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
