//! Unified error type for the generator.
//!
//! This module provides a single [`Error`] type that wraps the error of
//! every pipeline stage, so callers can use `?` across stages.

use thiserror::Error;

use crate::abi::{AbiError, LayoutError};
use crate::config::ConfigError;
use crate::convert::MarshalError;
use crate::emit::EmitError;
use crate::ingest::IngestError;
use crate::model::ModelError;
use crate::order::OrderError;

/// Unified error type for all generator operations.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::{Generation, GeneratorConfig, RegistryDocument, Result};
///
/// fn run() -> Result<()> {
///     let document = RegistryDocument::from_path("vk.json")?;
///     let generation = Generation::run(&document, &GeneratorConfig::default())?;
///     generation.write("out")?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Registry model construction or resolution.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Reading or mapping the registry document.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// ABI divergence analysis.
    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Record ordering.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Executing conversion routines.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Moving a finished artifact into place.
    #[error("Failed to write '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` for a dependency cycle among records, found either by
    /// the ABI analysis or by ordering.
    pub fn is_cyclic_dependency(&self) -> bool {
        matches!(
            self,
            Self::Abi(AbiError::CyclicDependency { .. })
                | Self::Order(OrderError::CyclicDependency { .. })
                | Self::Layout(LayoutError::CyclicDependency(_))
        )
    }

    /// Returns `true` if a referenced type, function or enum is missing.
    pub fn is_unknown_type(&self) -> bool {
        match self {
            Self::Model(e) | Self::Ingest(IngestError::Model(e)) | Self::Emit(EmitError::Model(e)) => {
                e.is_unknown_type()
            }
            _ => false,
        }
    }

    /// Returns `true` if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Persist { .. })
    }
}
