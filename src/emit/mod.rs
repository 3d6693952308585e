//! Text rendering of the generated C artifacts.
//!
//! Every artifact is rendered into memory from an [`EmitContext`]; nothing
//! here touches the filesystem.
//!
//! # Module Organization
//!
//! - [`decl`]: declarations shared by the headers
//! - [`conversions`]: conversion and free helper bodies
//! - [`public_header`], [`driver_header`], [`thunks_header`],
//!   [`thunks_source`]: one module per artifact

pub mod conversions;
pub mod decl;
pub mod driver_header;
pub mod public_header;
pub mod thunks_header;
pub mod thunks_source;

use thiserror::Error;

use crate::abi::AbiAnalysis;
use crate::classify::{Classifier, DispatchTables};
use crate::config::GeneratorConfig;
use crate::convert::ConversionPlan;
use crate::diagnostics::Diagnostics;
use crate::model::{EntityId, ModelError, Registry, Resolved};
use crate::select::RequiredSet;

/// First line of every artifact.
pub const GENERATED_BANNER: &str = "/* Automatically generated from Vulkan vk.xml; DO NOT EDIT! */\n\n";

#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to format output: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Everything the renderers read.
pub struct EmitContext<'a> {
    pub registry: &'a Registry<Resolved>,
    pub required: &'a RequiredSet,
    pub analysis: &'a AbiAnalysis,
    pub classifier: &'a Classifier<'a>,
    pub config: &'a GeneratorConfig,
    /// Required records in dependency order.
    pub record_order: &'a [EntityId],
    /// Required records needing conversion, in dependency order.
    pub host_order: &'a [EntityId],
    pub plan: &'a ConversionPlan,
    pub tables: &'a DispatchTables,
}

impl EmitContext<'_> {
    /// Required entities of a kind, in registry order.
    pub(crate) fn required_ids(&self, kind: crate::model::EntityKind) -> Vec<EntityId> {
        self.registry
            .iter()
            .filter(|(id, e)| e.kind() == kind && self.required.contains(*id))
            .map(|(id, _)| id)
            .collect()
    }

    /// Required functions sorted by name.
    pub(crate) fn required_functions(&self) -> Vec<EntityId> {
        self.registry
            .ids_of(crate::model::EntityKind::Function)
            .into_iter()
            .filter(|id| self.required.contains(*id))
            .collect()
    }
}

/// The four rendered artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub public_header: String,
    pub driver_header: String,
    pub thunks_header: String,
    pub thunks_source: String,
}

/// Render all four artifacts.
pub fn render_all(ctx: &EmitContext<'_>, diagnostics: &mut Diagnostics) -> Result<Artifacts, EmitError> {
    Ok(Artifacts {
        public_header: public_header::render(ctx)?,
        driver_header: driver_header::render(ctx)?,
        thunks_header: thunks_header::render(ctx)?,
        thunks_source: thunks_source::render(ctx, diagnostics)?,
    })
}
