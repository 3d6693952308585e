//! The end-to-end generation pipeline.
//!
//! [`Generation::run`] takes a registry document and a configuration through
//! every stage and keeps the intermediate results, so callers can inspect the
//! required set, the record orders and the conversion plan as well as the
//! rendered artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::abi::AbiAnalysis;
use crate::classify::{Classifier, DispatchTables};
use crate::config::{GeneratorConfig, OutputConfig};
use crate::convert::{ConversionPlan, Synthesizer};
use crate::diagnostics::Diagnostics;
use crate::emit::{self, Artifacts, EmitContext};
use crate::error::{Error, Result};
use crate::ingest::{self, RegistryDocument};
use crate::logging::{debug, info};
use crate::model::{EntityId, EntityKind, Registry, Resolved};
use crate::order;
use crate::select::{RequiredSet, Selector};

/// Result of one generator run.
#[derive(Debug)]
pub struct Generation {
    pub registry: Registry<Resolved>,
    pub required: RequiredSet,
    pub analysis: AbiAnalysis,
    /// Required records in dependency order.
    pub record_order: Vec<EntityId>,
    /// The subset of `record_order` that needs conversion.
    pub host_order: Vec<EntityId>,
    pub plan: ConversionPlan,
    pub tables: DispatchTables,
    pub artifacts: Artifacts,
    pub diagnostics: Diagnostics,
    config: GeneratorConfig,
}

impl Generation {
    /// Run every stage over `document`.
    pub fn run(document: &RegistryDocument, config: &GeneratorConfig) -> Result<Self> {
        let mut diagnostics = Diagnostics::new();

        let ingested = ingest::ingest(document)?;
        let mut registry = ingested.registry.resolve(&mut diagnostics)?;
        info!(entities = registry.len(), "registry loaded");

        let policy = config.policy();
        let mut selector = Selector::new(&mut registry);
        selector.apply_extension_enums(&ingested.extensions, &policy)?;
        selector.apply_feature_set(&ingested.features)?;
        selector.apply_extension_commands(&ingested.extensions, &policy)?;
        let required = selector.finish();
        registry.report_undefined_companions(&mut diagnostics);
        debug!(required = required.len(), "selection finished");

        let analysis = AbiAnalysis::new(&registry)?;

        let records: Vec<EntityId> = registry
            .iter()
            .filter(|(_, e)| e.kind() == EntityKind::Record)
            .map(|(id, _)| id)
            .collect();
        let record_order = order::decouple(&registry, &records, &required)?;
        let converted: Vec<EntityId> = record_order
            .iter()
            .copied()
            .filter(|id| analysis.record_needs_conversion(*id))
            .collect();
        let host_order = order::decouple(&registry, &converted, &required)?;
        debug!(
            records = record_order.len(),
            host_records = host_order.len(),
            "records ordered"
        );

        let (plan, tables, artifacts) = {
            let classifier = Classifier::new(&registry, config);
            let tables = classifier.dispatch_tables(&required);

            let thunked: Vec<EntityId> = registry
                .ids_of(EntityKind::Function)
                .into_iter()
                .filter(|id| required.contains(*id))
                .filter(|id| registry.function(*id).is_some_and(|f| classifier.emits_thunk(f)))
                .collect();
            let (plan, plan_diagnostics) =
                Synthesizer::new(&registry, &analysis).plan(&host_order, &thunked);
            diagnostics.merge(plan_diagnostics);

            let ctx = EmitContext {
                registry: &registry,
                required: &required,
                analysis: &analysis,
                classifier: &classifier,
                config,
                record_order: &record_order,
                host_order: &host_order,
                plan: &plan,
                tables: &tables,
            };
            let artifacts = emit::render_all(&ctx, &mut diagnostics)?;
            (plan, tables, artifacts)
        };
        info!(
            functions = required_functions(&registry, &required),
            helpers = plan.routines().len(),
            diagnostics = diagnostics.len(),
            "generation finished"
        );

        Ok(Self {
            registry,
            required,
            analysis,
            record_order,
            host_order,
            plan,
            tables,
            artifacts,
            diagnostics,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// A classifier over this run's registry and configuration.
    pub fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.registry, &self.config)
    }

    /// Names of the required functions, sorted.
    pub fn required_function_names(&self) -> Vec<&str> {
        self.registry
            .ids_of(EntityKind::Function)
            .into_iter()
            .filter(|id| self.required.contains(*id))
            .map(|id| self.registry.name(id))
            .collect()
    }

    /// Write the four artifacts under `out_dir` using the configured names.
    pub fn write(&self, out_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        write_artifacts(&self.artifacts, out_dir.as_ref(), &self.config.output)
    }
}

fn required_functions(registry: &Registry<Resolved>, required: &RequiredSet) -> usize {
    required
        .iter()
        .filter(|id| registry.function(*id).is_some())
        .count()
}

/// Write each artifact to a temporary file beside its destination, then move
/// them into place.
///
/// Every temporary file is written before any artifact is replaced, so a
/// failure while writing leaves all existing artifacts untouched. Only the
/// final renames can stop partway.
pub fn write_artifacts(
    artifacts: &Artifacts,
    out_dir: &Path,
    output: &OutputConfig,
) -> Result<Vec<PathBuf>> {
    let files = [
        (&output.public_header, &artifacts.public_header),
        (&output.driver_header, &artifacts.driver_header),
        (&output.thunks_header, &artifacts.thunks_header),
        (&output.thunks_source, &artifacts.thunks_source),
    ];

    let mut staged = Vec::with_capacity(files.len());
    for (name, text) in files {
        let path = out_dir.join(name);
        let parent = path.parent().unwrap_or(out_dir);
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(text.as_bytes())?;
        temp.as_file().sync_all()?;
        debug!(path = %path.display(), bytes = text.len(), "staged artifact");
        staged.push((temp, path));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (temp, path) in staged {
        temp.persist(&path).map_err(|source| Error::Persist {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}
