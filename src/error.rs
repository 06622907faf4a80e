//! Unified error handling for the xhub crate
//!
//! Each concern keeps its own error type; [`Error`] wraps them so callers
//! crossing module boundaries can use a single `Result`.
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::control::{ClientError, FrameError, MessengerError};
pub use crate::coordinator::ServerError;
pub use crate::resolver::ResolveError;
pub use crate::storage::StorageError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Sockets, timeouts, unreachable peers
    Network,
    /// Malformed datagrams or replies
    Protocol,
    /// Lookups that found nothing eligible
    Resolution,
    /// Files on disk
    Storage,
    /// Configuration and validation errors
    Config,
    Other,
}

/// Unified error type for the xhub crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Node command error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Messenger(_) | Self::Io(_) => true,
            Self::Client(e) => matches!(e, ClientError::Timeout(_) | ClientError::NetworkError(_)),
            Self::Storage(e) => matches!(e, StorageError::Io { .. }),
            Self::Server(e) => matches!(e, ServerError::Bind { .. }),
            Self::Frame(_) | Self::Resolve(_) | Self::Config(_) | Self::Other { .. } => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Messenger(_) | Self::Client(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Frame(_) => ErrorCategory::Protocol,
            Self::Resolve(_) => ErrorCategory::Resolution,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Server(e) => match e {
                ServerError::Config(_) => ErrorCategory::Config,
                ServerError::Storage(_) => ErrorCategory::Storage,
                ServerError::Bind { .. } | ServerError::Serve(_) => ErrorCategory::Network,
            },
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_category() {
        let frame: Error = FrameError::Empty.into();
        assert_eq!(frame.category(), ErrorCategory::Protocol);

        let resolve: Error = ResolveError::UnknownDomain("api".into()).into();
        assert_eq!(resolve.category(), ErrorCategory::Resolution);

        let timeout: Error = ClientError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(timeout.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_is_recoverable() {
        let timeout: Error = ClientError::Timeout(Duration::from_secs(3)).into();
        assert!(timeout.is_recoverable());

        let invalid: Error = ClientError::InvalidResponse("x".into()).into();
        assert!(!invalid.is_recoverable());

        let config: Error = ConfigError::InvalidValue {
            field: "udp_bind".into(),
            reason: "bad".into(),
        }
        .into();
        assert!(!config.is_recoverable());
        assert_eq!(config.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "Something went wrong");
    }
}
