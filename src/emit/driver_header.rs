//! The driver interface header.

use std::fmt::Write;

use super::decl;
use super::{EmitContext, EmitError, GENERATED_BANNER};

pub fn render(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let mut out = String::from(GENERATED_BANNER);
    out.push_str("#ifndef __WINE_VULKAN_DRIVER_H\n");
    out.push_str("#define __WINE_VULKAN_DRIVER_H\n\n");

    out.push_str(
        "/* Wine internal vulkan driver version, needs to be bumped upon vulkan_funcs changes. */\n",
    );
    writeln!(out, "#define WINE_VULKAN_DRIVER_VERSION {}\n", ctx.config.driver.version)?;

    out.push_str("struct vulkan_funcs\n{\n");
    out.push_str("    /* Vulkan global functions. These are the only calls at this point a graphics driver\n");
    out.push_str("     * needs to provide. Other function calls will be provided indirectly by dispatch\n");
    out.push_str("     * tables part of dispatchable Vulkan objects such as VkInstance or vkDevice.\n");
    out.push_str("     */\n");
    for name in &ctx.config.driver.functions {
        let id = ctx.registry.lookup_function(name)?;
        let Some(f) = ctx.registry.function(id) else {
            continue;
        };
        // The callback pointer type carries calling convention decorations.
        let pfn = decl::pfn(ctx.analysis, f, false).replace("PFN_vkVoidFunction", "void *");
        writeln!(out, "    {pfn};")?;
    }
    out.push_str("};\n\n");

    out.push_str(
        "extern struct vulkan_funcs * CDECL __wine_get_vulkan_driver(HDC hdc, UINT version);\n\n",
    );
    out.push_str("#endif /* __WINE_VULKAN_DRIVER_H */\n");
    Ok(out)
}
