//! The private thunks header: override prototypes, host records, the two
//! dispatch table structs and the function list macros.

use std::fmt::Write;

use crate::classify::Scope;
use crate::model::EntityId;

use super::decl::{self, HOST_SUFFIX, MemberStyle};
use super::{EmitContext, EmitError, GENERATED_BANNER};

pub fn render(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let registry = ctx.registry;
    let mut out = String::from(GENERATED_BANNER);
    out.push_str("#ifndef __WINE_VULKAN_THUNKS_H\n");
    out.push_str("#define __WINE_VULKAN_THUNKS_H\n\n");

    out.push_str("/* For use by vk_icdGetInstanceProcAddr / vkGetInstanceProcAddr */\n");
    out.push_str("void *wine_vk_get_device_proc_addr(const char *name) DECLSPEC_HIDDEN;\n");
    out.push_str("void *wine_vk_get_instance_proc_addr(const char *name) DECLSPEC_HIDDEN;\n\n");

    out.push_str("/* Functions for which we have custom implementations outside of the thunks. */\n");
    for name in ctx.config.overrides.keys() {
        let Some(id) = registry.find(name).filter(|id| ctx.required.contains(*id)) else {
            continue;
        };
        let Some(f) = registry.function(id) else {
            continue;
        };
        if ctx.classifier.scope(f) == Scope::Global || ctx.classifier.emits_thunk(f) {
            continue;
        }
        writeln!(
            out,
            "{};",
            decl::prototype(f, Some("WINAPI"), &ctx.config.prefix, Some("DECLSPEC_HIDDEN"))
        )?;
    }
    out.push('\n');

    for id in ctx.host_order {
        if let Some(r) = registry.record(*id) {
            out.push_str(&decl::record(registry, ctx.analysis, r, MemberStyle::Host, HOST_SUFFIX));
        }
    }
    out.push('\n');

    out.push_str("/* For use by vkDevice and children */\n");
    table_struct(ctx, &mut out, "vulkan_device_funcs", ctx.tables.table(Scope::SubObject))?;
    out.push_str("/* For use by vkInstance and children */\n");
    table_struct(ctx, &mut out, "vulkan_instance_funcs", ctx.tables.table(Scope::TopObject))?;

    list_macro(ctx, &mut out, "ALL_VK_DEVICE_FUNCS", ctx.tables.table(Scope::SubObject));
    list_macro(ctx, &mut out, "ALL_VK_INSTANCE_FUNCS", ctx.tables.table(Scope::TopObject));

    out.push_str("#endif /* __WINE_VULKAN_THUNKS_H */\n");
    Ok(out)
}

fn table_struct(
    ctx: &EmitContext<'_>,
    out: &mut String,
    name: &str,
    table: &[EntityId],
) -> Result<(), EmitError> {
    writeln!(out, "struct {name}\n{{")?;
    for f in table.iter().filter_map(|id| ctx.registry.function(*id)) {
        writeln!(out, "    {};", decl::pfn(ctx.analysis, f, true))?;
    }
    out.push_str("};\n\n");
    Ok(())
}

/// `#define ALL_VK_DEVICE_FUNCS() \` followed by one `USE_VK_FUNC` per line.
fn list_macro(ctx: &EmitContext<'_>, out: &mut String, name: &str, table: &[EntityId]) {
    out.push_str(&format!("#define {name}() \\\n"));
    let entries: Vec<String> = table
        .iter()
        .map(|id| format!("    USE_VK_FUNC({})", ctx.registry.name(*id)))
        .collect();
    out.push_str(&entries.join(" \\\n"));
    out.push_str("\n\n");
}
