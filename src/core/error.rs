//! Error types for the log relay
//!
//! None of these ever reach code calling a logger handle. They are returned
//! by sink and bridge operations, collected in a [`ConfigReport`] at
//! configure time, and written to the diagnostic channel.
//!
//! [`ConfigReport`]: crate::core::relay::ConfigReport

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Relay channel full
    #[error("Relay queue full: capacity {capacity}")]
    QueueFull { capacity: usize },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSink { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotation { path: String, message: String },

    /// Another relay holds the log file
    #[error("Log file '{path}' is locked by another relay")]
    FileLocked { path: String },

    /// Cross-process bridge failure
    #[error("Bridge error: {message}")]
    Bridge { message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        RelayError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::FileSink {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::FileRotation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn file_locked(path: impl Into<String>) -> Self {
        RelayError::FileLocked { path: path.into() }
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        RelayError::Bridge {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        RelayError::Other(msg.into())
    }
}
