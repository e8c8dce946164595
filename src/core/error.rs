//! Error types and handling for Massive Jsonify
//!
//! Every failure aborts the whole encode or decode call. There is no
//! best-effort output: a partially hydrated cyclic graph cannot be told apart
//! from a complete one, so the caller always gets either the full value or
//! one of these errors.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the serialization engine
#[derive(Error, Debug)]
pub enum Error {
    /// A value has no structural shape and no tag encoder claimed it
    #[error("Unsupported value kind `{kind}` at {path}")]
    UnsupportedValueKind {
        /// Type name of the offending value
        kind: String,
        /// JSONPath-like location of the value, starting at `$`
        path: String,
    },

    /// Input is not valid JSON or does not follow the slot table layout
    #[error("Malformed wire format: {0}")]
    MalformedWireFormat(String),

    /// A reference points outside the slot table
    #[error("Dangling reference {reference} (table has {table_len} slots)")]
    DanglingReference {
        /// Raw wire reference
        reference: i64,
        /// Number of slots in the table being decoded
        table_len: usize,
    },

    /// A tagged entry names a tag no decoder is registered for
    #[error("Unknown tag `{tag}`")]
    UnknownTag {
        /// The unrecognized tag name
        tag: String,
    },

    /// A tag decoder rejected its payload
    #[error("Invalid payload for tag `{tag}`: {reason}")]
    InvalidPayload {
        /// Tag whose payload was rejected
        tag: String,
        /// Why the payload was rejected
        reason: String,
    },

    /// A tagged slot needs its own value to build its payload
    #[error("Tagged slot {slot} (`{tag}`) refers to itself through its payload")]
    CyclicTaggedValue {
        /// Tag of the slot under construction
        tag: String,
        /// Index of the slot under construction
        slot: usize,
    },

    /// The slot table grew beyond the caller's limit
    #[error("Slot table too large: {size} slots (max: {max_size})")]
    TableTooLarge {
        /// Number of slots reached
        size: usize,
        /// Maximum allowed number of slots
        max_size: usize,
    },

    /// The value graph is nested deeper than the caller's limit
    #[error("Nesting too deep: depth {depth} (max: {max_depth})")]
    DepthExceeded {
        /// Depth reached
        depth: usize,
        /// Maximum allowed depth
        max_depth: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal engine errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedWireFormat(err.to_string())
    }
}

impl Error {
    /// Create a malformed wire format error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedWireFormat(msg.into())
    }

    /// Create an unknown tag error
    pub fn unknown_tag(tag: impl Into<String>) -> Self {
        Self::UnknownTag { tag: tag.into() }
    }

    /// Create an invalid payload error
    pub fn invalid_payload(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error can only be raised while encoding
    pub fn is_encode_error(&self) -> bool {
        matches!(self, Error::UnsupportedValueKind { .. })
    }

    /// Check if this error can only be raised while decoding
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedWireFormat(_)
                | Error::DanglingReference { .. }
                | Error::UnknownTag { .. }
                | Error::InvalidPayload { .. }
                | Error::CyclicTaggedValue { .. }
        )
    }

    /// Check if this error comes from a caller-imposed limit
    pub fn is_limit_error(&self) -> bool {
        matches!(
            self,
            Error::TableTooLarge { .. } | Error::DepthExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_become_malformed() {
        let err: Error = serde_json::from_str::<serde_json::Value>("[1,").unwrap_err().into();
        assert!(matches!(err, Error::MalformedWireFormat(_)));
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_classification() {
        let err = Error::UnsupportedValueKind {
            kind: "Widget".to_string(),
            path: "$.a[0]".to_string(),
        };
        assert!(err.is_encode_error());
        assert!(!err.is_decode_error());
        assert_eq!(err.to_string(), "Unsupported value kind `Widget` at $.a[0]");

        let err = Error::TableTooLarge { size: 11, max_size: 10 };
        assert!(err.is_limit_error());
        assert!(!err.is_encode_error());
    }
}
