//! Error types for the WiFi-Gesture system.
//!
//! This module provides error handling using [`thiserror`] for automatic
//! `Display` and `Error` trait implementations.
//!
//! # Error Hierarchy
//!
//! - [`CoreError`]: Top-level error type that encompasses all subsystem errors
//! - [`ClassifierError`]: Errors from loading or checking the gesture model
//! - [`TransportError`]: Errors from the line-oriented sensor transport
//!
//! Malformed sensor lines are deliberately *not* part of this hierarchy: they
//! are dropped by the pipeline stage that rejects them and never surface as
//! an error to the caller.
//!
//! # Example
//!
//! ```rust
//! use wifi_gesture_core::error::{ClassifierError, CoreError};
//!
//! fn check_model(n_features: usize) -> Result<(), CoreError> {
//!     if n_features != 14 {
//!         return Err(ClassifierError::ArityMismatch { expected: 14, actual: n_features }.into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_model(12).is_err());
//! ```

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the WiFi-Gesture system.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Classifier loading or compatibility error
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// Validation error for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },
}

impl CoreError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns `true` if this error must stop a detection session from
    /// starting (or keep it from continuing).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Classifier(_) | Self::Configuration { .. } => true,
            Self::Transport(e) => !e.is_retryable(),
            Self::Validation { .. } => false,
        }
    }
}

/// Errors raised by the classifier adapter.
///
/// All of these are startup errors: a session never begins with a model it
/// cannot feed.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClassifierError {
    /// The model was trained on a different feature layout.
    #[error("Feature arity mismatch: pipeline produces {expected} features, model expects {actual}")]
    ArityMismatch {
        /// Number of features the pipeline produces
        expected: usize,
        /// Number of features the model was trained on
        actual: usize,
    },

    /// The model exposes no class labels.
    #[error("Model exposes no class labels")]
    NoClasses,

    /// The model artifact could not be used.
    #[error("Model unavailable: {message}")]
    Unavailable {
        /// Description of the failure
        message: String,
    },
}

impl ClassifierError {
    /// Creates a new unavailable-model error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`LineSource`](crate::traits::LineSource).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The device went away (unplugged, remote closed, ...).
    #[error("Transport disconnected: {message}")]
    Disconnected {
        /// Description of the disconnect
        message: String,
    },

    /// Underlying I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source was used after `close()`.
    #[error("Transport already closed")]
    Closed,

    /// Transient failure the driver may ride through.
    #[error("Transient transport error: {message}")]
    Transient {
        /// Description of the failure
        message: String,
    },
}

impl TransportError {
    /// Creates a new disconnect error.
    #[must_use]
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Creates a new transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Returns `true` if the driver may keep reading after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_mismatch_display() {
        let err = ClassifierError::ArityMismatch {
            expected: 14,
            actual: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("14"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_classifier_errors_are_fatal() {
        let err: CoreError = ClassifierError::NoClasses.into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transport_retryability() {
        assert!(TransportError::transient("busy").is_retryable());
        assert!(!TransportError::disconnected("unplugged").is_retryable());
        assert!(!TransportError::Closed.is_retryable());

        let err: CoreError = TransportError::disconnected("gone").into();
        assert!(err.is_fatal());
        let err: CoreError = TransportError::transient("busy").into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
