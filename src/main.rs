use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

use vk_thunkgen::convert::verify_routines;
use vk_thunkgen::subscriber::{self, SubscriberError};
use vk_thunkgen::{Generation, GeneratorConfig, RegistryDocument};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Generator(#[from] vk_thunkgen::Error),

    #[error("Logging setup failed: {0}")]
    Subscriber(#[from] SubscriberError),

    #[error("{mismatches} conversion mismatches, {leaked} leaked allocations")]
    Verify { mismatches: usize, leaked: usize },
}

impl From<vk_thunkgen::config::ConfigError> for AppError {
    fn from(e: vk_thunkgen::config::ConfigError) -> Self {
        Self::Generator(e.into())
    }
}

impl From<vk_thunkgen::ingest::IngestError> for AppError {
    fn from(e: vk_thunkgen::ingest::IngestError) -> Self {
        Self::Generator(e.into())
    }
}

impl From<vk_thunkgen::convert::MarshalError> for AppError {
    fn from(e: vk_thunkgen::convert::MarshalError) -> Self {
        Self::Generator(e.into())
    }
}

#[derive(Parser)]
#[command(name = "vk-thunkgen")]
#[command(about = "Generate Win32 Vulkan headers and call-forwarding thunks from the API registry")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the four artifacts into an output directory
    Generate {
        /// Registry document (.json or .toml)
        #[arg(short, long, env = "VK_THUNKGEN_REGISTRY")]
        registry: PathBuf,

        /// Generator configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory the artifacts are written to
        #[arg(short, long)]
        out_dir: PathBuf,
    },

    /// Print the selection, record order and function scopes
    Analyze {
        /// Registry document (.json or .toml)
        #[arg(short, long, env = "VK_THUNKGEN_REGISTRY")]
        registry: PathBuf,

        /// Generator configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Round-trip every planned conversion through the marshaller
    Verify {
        /// Registry document (.json or .toml)
        #[arg(short, long, env = "VK_THUNKGEN_REGISTRY")]
        registry: PathBuf,

        /// Generator configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig, AppError> {
    match path {
        Some(path) => Ok(GeneratorConfig::from_file(path)?),
        None => Ok(GeneratorConfig::default()),
    }
}

fn run(registry: &Path, config: &GeneratorConfig) -> Result<Generation, AppError> {
    let document = RegistryDocument::from_path(registry)?;
    Ok(Generation::run(&document, config)?)
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            registry,
            config,
            out_dir,
        } => {
            let config = load_config(config.as_deref())?;
            subscriber::init(&config.logging, cli.verbose)?;

            let generation = run(&registry, &config)?;
            for path in generation.write(&out_dir)? {
                println!("{}", path.display());
            }
            if !generation.diagnostics.is_empty() {
                eprintln!("{} diagnostics reported", generation.diagnostics.len());
            }
        }

        Commands::Analyze { registry, config } => {
            let config = load_config(config.as_deref())?;
            subscriber::init(&config.logging, cli.verbose)?;

            let generation = run(&registry, &config)?;
            let functions = generation.required_function_names();
            println!("required entities:  {}", generation.required.len());
            println!("required functions: {}", functions.len());
            println!("records:            {}", generation.record_order.len());
            println!("host records:       {}", generation.host_order.len());
            println!("conversion helpers: {}", generation.plan.routines().len());

            println!();
            println!("Conversion order:");
            for id in &generation.host_order {
                println!("  {}", generation.registry.name(*id));
            }

            println!();
            println!("Function scopes:");
            let classifier = generation.classifier();
            for name in functions {
                let Some(f) = generation
                    .registry
                    .find(name)
                    .and_then(|id| generation.registry.function(id))
                else {
                    continue;
                };
                let thunk = if classifier.emits_thunk(f) { "" } else { " (override)" };
                println!("  {:<48} {}{}", name, classifier.scope(f), thunk);
            }

            if !generation.diagnostics.is_empty() {
                println!();
                println!("Diagnostics:");
                for diagnostic in generation.diagnostics.iter() {
                    println!("  {diagnostic}");
                }
            }
        }

        Commands::Verify { registry, config } => {
            let config = load_config(config.as_deref())?;
            subscriber::init(&config.logging, cli.verbose)?;

            let generation = run(&registry, &config)?;
            let report = verify_routines(&generation.registry, &generation.plan)?;
            for name in &report.checked {
                println!("ok       {name}");
            }
            for (name, reason) in &report.skipped {
                println!("skipped  {name}: {reason}");
            }
            for path in &report.mismatches {
                println!("MISMATCH {path}");
            }
            if !report.is_ok() {
                return Err(AppError::Verify {
                    mismatches: report.mismatches.len(),
                    leaked: report.leaked,
                });
            }
        }
    }

    Ok(())
}
