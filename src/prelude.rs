//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use vk_thunkgen::prelude::*;
//!
//! let document = RegistryDocument::from_path("vk.json")?;
//! let generation = Generation::run(&document, &GeneratorConfig::default())?;
//! let report = verify_routines(&generation.registry, &generation.plan)?;
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Pipeline
pub use crate::config::{FunctionOverride, GeneratorConfig};
pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::emit::Artifacts;
pub use crate::generator::{Generation, write_artifacts};
pub use crate::ingest::RegistryDocument;

// Model and analysis
pub use crate::abi::AbiAnalysis;
pub use crate::classify::{Classifier, Scope};
pub use crate::convert::{ConversionPlan, Direction, verify_routines};
pub use crate::model::{Entity, EntityId, EntityKind, Registry, Resolved};
pub use crate::select::RequiredSet;
