//! Error types for the protocol layer.
//!
//! Decoding and classification fail differently on purpose. A
//! [`DecodeError`] means the bytes weren't a JSON object at all, and the
//! server treats that as a broken connection. A [`SchemaError`] means the
//! object was readable but not a valid request, and the sender gets a
//! `400` back while the connection stays open.

/// The payload could not be turned into a key-value record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The bytes are not valid UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    NotUtf8(#[source] std::str::Utf8Error),

    /// The text is not well-formed JSON.
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    /// The JSON is well-formed but not an object. Carries the kind found.
    #[error("payload is a JSON {0}, expected an object")]
    NotObject(&'static str),
}

/// The record decoded fine but doesn't match any request shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Missing or unknown action tag, missing field, or wrong field type.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed. Never happens for this crate's own types.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes could not be decoded into an object.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The object is not a valid message.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
