//! Error types for reading a registry document.

use thiserror::Error;

use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read registry '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON registry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML registry: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported registry format '{0}' (expected .json or .toml)")]
    UnsupportedFormat(String),

    #[error("Invalid value '{value}' for enum value {name}")]
    InvalidEnumValue { name: String, value: String },

    #[error("Enum value {0} has neither a value nor a bitpos")]
    MissingEnumValue(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}
