use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Asset '{name}' is unreadable: {reason}")]
    AssetUnreadable { name: String, reason: String },

    #[error("Template is missing the '{placeholder}' placeholder")]
    MissingPlaceholder { placeholder: String },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Refusing to open '{url}' externally: {reason}")]
    OpenRefused { url: String, reason: String },

    #[error("Failed to open '{url}': {reason}")]
    OpenFailed { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons an inbound payload could not be turned into a typed value.
///
/// These never reach the host; the bridge logs them and drops the message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Payload is not valid UTF-8")]
    Utf8,

    #[error("Expected {expected} on channel '{channel}'")]
    WrongType {
        channel: String,
        expected: &'static str,
    },

    #[error("Invalid height {value}: must be finite and non-negative")]
    InvalidHeight { value: f64 },

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("Body of {size} bytes exceeds limit of {limit} bytes")]
    Oversized { size: usize, limit: usize },

    #[error("Malformed escaped literal: {0}")]
    MalformedLiteral(String),
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        DecodeError::Base64(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        DecodeError::Utf8
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
