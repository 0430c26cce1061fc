//! AMQP management and CBS error types.
//!
//! # Error Classification
//!
//! Errors returned synchronously from an API call fall into these groups:
//!
//! - **Argument errors**: a required argument was empty. Nothing changed.
//! - **State errors**: the call is not valid in the current lifecycle state.
//!   Operations are never queued while the instance is not open.
//! - **Collaborator errors**: the underlying session, link, sender or receiver
//!   refused a request. Any partially created resources have been released.
//!
//! Failures that happen *after* a call returned (send failures, bad replies,
//! link regressions) are never reported through these types. They are
//! delivered through the completion or error callbacks instead.

use thiserror::Error;

/// Errors returned by the management and CBS clients.
#[derive(Error, Debug)]
pub enum AmqpCbsError {
    /// A required argument was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The call is not allowed in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Link, sender or receiver creation, open or close failed.
    #[error("Link error: {0}")]
    Link(String),

    /// The message sender refused a message.
    #[error("Send error: {0}")]
    Send(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for management and CBS operations
pub type Result<T> = std::result::Result<T, AmqpCbsError>;

impl From<toml::de::Error> for AmqpCbsError {
    fn from(err: toml::de::Error) -> Self {
        AmqpCbsError::Config(format!("Failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AmqpCbsError::InvalidState("not open".to_string());
        assert_eq!(err.to_string(), "Invalid state: not open");

        let err = AmqpCbsError::Link("receiver refused".to_string());
        assert!(err.to_string().contains("receiver refused"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("[management");
        let err: AmqpCbsError = parse.unwrap_err().into();
        assert!(matches!(err, AmqpCbsError::Config(_)));
    }
}
