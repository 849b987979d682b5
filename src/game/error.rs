// src/game/error.rs
// Error types for resource configuration, lookup and wire encoding

use thiserror::Error;

/// Problems found while reading the resource-type definition file.
///
/// Everything except `Io` is recoverable: the parser logs it, records it and
/// keeps going with the rest of the file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read resource config: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: header has {fields} fields, expected 5")]
    MalformedHeader { line: usize, fields: usize },

    #[error("line {line}: invalid integer '{value}'")]
    InvalidNumber { line: usize, value: String },

    #[error("resource type '{name}' ended after {levels} of 5 level lines")]
    TruncatedRecord { name: String, levels: usize },
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unknown resource type: {0}")]
    UnknownType(String),

    #[error("failed to encode/decode discrete event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize position update: {0}")]
    FlexSerialize(#[from] flexbuffers::SerializationError),

    #[error("failed to deserialize position update: {0}")]
    FlexDeserialize(#[from] flexbuffers::DeserializationError),
}
