//! Common test utilities and fixtures.
//!
//! This module provides the registry fixture, pipeline helpers and text
//! helpers for picking pieces out of rendered artifacts.

#![allow(dead_code)]

use std::path::PathBuf;

use vk_thunkgen::model::{Function, Resolved};
use vk_thunkgen::{Generation, GeneratorConfig, RegistryDocument};

// =============================================================================
// Fixtures
// =============================================================================

/// Path of the miniature Vulkan registry shared by the integration tests.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("mini_registry.json")
}

pub fn load_fixture() -> anyhow::Result<RegistryDocument> {
    Ok(RegistryDocument::from_path(fixture_path())?)
}

/// Run the full pipeline over the fixture.
pub fn generate(config: &GeneratorConfig) -> anyhow::Result<Generation> {
    let document = load_fixture()?;
    Ok(Generation::run(&document, config)?)
}

pub fn generate_default() -> anyhow::Result<Generation> {
    generate(&GeneratorConfig::default())
}

/// Run the pipeline over an inline JSON registry.
pub fn generate_json(json: &str, config: &GeneratorConfig) -> anyhow::Result<Generation> {
    let document = RegistryDocument::from_json_str(json)?;
    Ok(Generation::run(&document, config)?)
}

// =============================================================================
// Lookups
// =============================================================================

pub fn function<'g>(generation: &'g Generation, name: &str) -> anyhow::Result<&'g Function<Resolved>> {
    let id = generation.registry.lookup_function(name)?;
    generation
        .registry
        .function(id)
        .ok_or_else(|| anyhow::anyhow!("{name} is not a function"))
}

pub fn is_required(generation: &Generation, name: &str) -> bool {
    generation
        .registry
        .find(name)
        .is_some_and(|id| generation.required.contains(id))
}

// =============================================================================
// Text helpers
// =============================================================================

/// The generated thunk of `function`, from its signature to the closing
/// brace.
pub fn thunk_body<'a>(source: &'a str, function: &str) -> Option<&'a str> {
    let start = source.find(&format!(" WINAPI wine_{function}("))?;
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let end = source[line_start..].find("\n}\n")?;
    Some(&source[line_start..line_start + end + 3])
}

/// The `#define NAME() \` macro block.
pub fn macro_block<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let start = header.find(&format!("#define {name}() \\\n"))?;
    let end = header[start..].find("\n\n")?;
    Some(&header[start..start + end])
}

/// The brace-enclosed body following `opening`.
pub fn block_after<'a>(text: &'a str, opening: &str) -> Option<&'a str> {
    let start = text.find(opening)?;
    let end = text[start..].find("};")?;
    Some(&text[start..start + end + 2])
}

/// Text from `opening` up to and including `closing`.
pub fn section<'a>(text: &'a str, opening: &str, closing: &str) -> Option<&'a str> {
    let start = text.find(opening)?;
    let end = text[start..].find(closing)?;
    Some(&text[start..start + end + closing.len()])
}

/// Byte offset of `needle`, for order assertions.
pub fn position(text: &str, needle: &str) -> usize {
    text.find(needle).unwrap_or(usize::MAX)
}
