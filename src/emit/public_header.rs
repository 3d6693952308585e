//! The public API header.
//!
//! Independent constants and types come first, then records in dependency
//! order, then prototypes, so the header needs no forward declarations.

use std::fmt::Write;

use crate::logging::trace;
use crate::model::{Entity, EntityKind};

use super::decl::{self, MemberStyle};
use super::{EmitContext, EmitError, GENERATED_BANNER};

const PREAMBLE: &str = "\
#ifndef __WINE_VULKAN_H
#define __WINE_VULKAN_H

#include <windef.h>
#include <stdint.h>

#ifndef VKAPI_CALL
#define VKAPI_CALL __stdcall
#endif

#ifndef VKAPI_PTR
#define VKAPI_PTR VKAPI_CALL
#endif

/* Callers can override WINE_VK_ALIGN if they want 'host' headers. */
#ifndef WINE_VK_ALIGN
#define WINE_VK_ALIGN DECLSPEC_ALIGN
#endif

";

pub fn render(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let registry = ctx.registry;
    let mut out = String::from(GENERATED_BANNER);
    out.push_str(PREAMBLE);

    // Every constant and macro is emitted regardless of requirement.
    for (_, entity) in registry.iter() {
        if let Entity::Constant(c) = entity {
            out.push_str(&decl::constant(c));
        }
    }
    out.push('\n');
    for (_, entity) in registry.iter() {
        if let Entity::Macro(m) = entity {
            out.push_str(&decl::macro_definition(m));
        }
    }

    for id in ctx.required_ids(EntityKind::Handle) {
        if let Some(h) = registry.handle(id) {
            out.push_str(&decl::handle(h));
        }
    }
    out.push('\n');

    let aliases: Vec<_> = ctx
        .required_ids(EntityKind::Alias)
        .into_iter()
        .filter_map(|id| registry.alias(id))
        .collect();
    for a in aliases.iter().filter(|a| !a.bitmask) {
        out.push_str(&decl::alias(a));
    }
    out.push('\n');
    for a in aliases.iter().filter(|a| a.bitmask) {
        out.push_str(&decl::alias(a));
    }
    out.push('\n');

    for id in ctx.required_ids(EntityKind::Enum) {
        match registry.enumeration(id) {
            Some(e) if e.defined => out.push_str(&decl::enumeration(e)),
            Some(e) => trace!(name = %e.name, "skipping enum without values"),
            None => {}
        }
    }

    for id in ctx.required_ids(EntityKind::FunctionPointer) {
        if let Some(fp) = registry.function_pointer(id) {
            out.push_str(&decl::function_pointer(fp));
        }
    }
    out.push('\n');

    for id in ctx.record_order {
        if let Some(r) = registry.record(*id) {
            out.push_str(&decl::record(registry, ctx.analysis, r, MemberStyle::Aligned, ""));
        }
    }

    for id in ctx.required_functions() {
        if let Some(f) = registry.function(id) {
            writeln!(out, "{};", decl::prototype(f, Some("VKAPI_CALL"), "", None))?;
        }
    }
    out.push('\n');

    out.push_str("#endif /* __WINE_VULKAN_H */\n");
    Ok(out)
}
