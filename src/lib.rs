//! Vulkan registry to Win32 thunk generator.
//!
//! This library reads a Vulkan API registry, selects the subset of the API a
//! build supports, works out which structures lay out differently for a Win32
//! caller and the host driver, and renders the C headers and thunk source
//! that forward every call through per-object dispatch tables.
//!
//! # Quick Start
//!
//! ```ignore
//! use vk_thunkgen::prelude::*;
//!
//! let document = RegistryDocument::from_path("vk.json")?;
//! let config = GeneratorConfig::from_file("thunkgen.toml")?;
//!
//! let generation = Generation::run(&document, &config)?;
//! for diagnostic in generation.diagnostics.iter() {
//!     eprintln!("{diagnostic}");
//! }
//! generation.write("out")?;
//! ```
//!
//! # Module Organization
//!
//! - [`model`] - Entity arena with the unresolved/resolved typestate
//! - [`ingest`] - Registry document types and the mapping into the model
//! - [`select`] - Feature and extension selection, required closure
//! - [`abi`] - Win32/host layout divergence and concrete layouts
//! - [`order`] - Dependency ordering of records
//! - [`convert`] - Conversion routine planning and the marshaller
//! - [`classify`] - Call scopes, dispatch tables and trace formats
//! - [`emit`] - Rendering of the four C artifacts
//! - [`generator`] - The end-to-end pipeline and artifact writing
//! - [`config`] - TOML generator configuration
//!
//! # Feature Flags
//!
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the command-line interface binary (enabled by default)

pub mod abi;
pub mod classify;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod emit;
pub mod generator;
pub mod ingest;
mod logging;
pub mod model;
pub mod order;
pub mod prelude;
pub mod select;
#[cfg(feature = "cli")]
pub mod subscriber;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export the pipeline entry points at crate root for convenience
pub use config::GeneratorConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use emit::Artifacts;
pub use generator::{Generation, write_artifacts};
pub use ingest::RegistryDocument;
pub use model::{EntityId, Registry, Resolved, Unresolved};
