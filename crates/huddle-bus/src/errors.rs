//! Bus error types.

use thiserror::Error;

/// Errors raised by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus could not be reached or is not supported.
    #[error("bus connect failed: {0}")]
    Connect(String),

    /// The bus was closed.
    #[error("bus is closed")]
    Closed,

    /// A subject or pattern does not follow the dot-delimited grammar.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// A payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload could not be decoded.
    #[error("decode error on {subject}: {source}")]
    Decode {
        /// Subject the payload arrived on.
        subject: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for bus results.
pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_subject() {
        let source = serde_json::from_str::<u8>("nope").unwrap_err();
        let err = BusError::Decode {
            subject: "session.s1.chat.in".into(),
            source,
        };
        assert!(err.to_string().starts_with("decode error on session.s1.chat.in"));
    }

    #[test]
    fn closed_display() {
        assert_eq!(BusError::Closed.to_string(), "bus is closed");
    }
}
