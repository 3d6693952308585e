//! The thunks source: conversion helpers, one thunk per forwarded function,
//! the dispatch arrays and the name lookups.

use std::fmt::Write;

use crate::classify::Scope;
use crate::diagnostics::Diagnostics;
use crate::logging::debug;
use crate::model::{EntityId, Function, Param, Resolved};

use super::decl::{self, HOST_SUFFIX};
use super::{EmitContext, EmitError, GENERATED_BANNER, conversions};

const INCLUDES: &str = "\
#include \"config.h\"
#include \"wine/port.h\"

#include <stdarg.h>

#include \"windef.h\"
#include \"winbase.h\"

#include \"wine/debug.h\"
#include \"wine/vulkan.h\"
#include \"wine/vulkan_driver.h\"
#include \"vulkan_private.h\"

WINE_DEFAULT_DEBUG_CHANNEL(vulkan);

";

pub fn render(ctx: &EmitContext<'_>, diagnostics: &mut Diagnostics) -> Result<String, EmitError> {
    let mut out = String::from(GENERATED_BANNER);
    out.push_str(INCLUDES);
    out.push_str(&conversions::render(ctx.registry, ctx.plan));

    let mut thunks = 0usize;
    for id in ctx.required_functions() {
        let Some(f) = ctx.registry.function(id) else {
            continue;
        };
        if !ctx.classifier.emits_thunk(f) {
            continue;
        }
        out.push_str("static ");
        out.push_str(&thunk(ctx, f, diagnostics)?);
        thunks += 1;
    }
    debug!(thunks = thunks, helpers = ctx.plan.routines().len(), "thunks rendered");

    dispatch_array(ctx, &mut out, "vk_device_dispatch_table", ctx.tables.table(Scope::SubObject))?;
    out.push('\n');
    dispatch_array(ctx, &mut out, "vk_instance_dispatch_table", ctx.tables.table(Scope::TopObject))?;
    out.push('\n');
    lookup(&mut out, "device")?;
    out.push('\n');
    lookup(&mut out, "instance")?;
    Ok(out)
}

/// A parameter the thunk hands to the driver in host layout.
struct Converted<'f> {
    param: &'f Param<Resolved>,
    record: String,
    returned_only: bool,
    owns_heap: bool,
}

impl Converted<'_> {
    fn host(&self) -> String {
        format!("{}{HOST_SUFFIX}", self.param.name)
    }

    fn is_array(&self) -> bool {
        self.param.is_dynamic_array()
    }
}

/// Element count of an array parameter; output counts arrive by pointer.
fn count_expr(f: &Function<Resolved>, p: &Param<Resolved>) -> String {
    let Some(len) = &p.len else {
        return "1".to_string();
    };
    match f.param(len) {
        Some(count) if count.is_pointer() => format!("*{len}"),
        _ => len.clone(),
    }
}

fn thunk(
    ctx: &EmitContext<'_>,
    f: &Function<Resolved>,
    diagnostics: &mut Diagnostics,
) -> Result<String, EmitError> {
    let converted: Vec<Converted<'_>> = f
        .params
        .iter()
        .filter(|p| ctx.analysis.member_needs_conversion(p))
        .filter_map(|p| {
            let id = p.entity()?;
            let r = ctx.registry.record(id)?;
            Some(Converted {
                param: p,
                record: r.name.clone(),
                returned_only: r.returned_only,
                owns_heap: ctx.plan.owns_heap(id),
            })
        })
        .collect();

    let mut out = decl::prototype(f, Some("WINAPI"), &ctx.config.prefix, None);
    out.push_str("\n{\n");
    if !f.returns_void() {
        writeln!(out, "    {} result;", f.return_type)?;
    }
    for c in &converted {
        if c.is_array() {
            writeln!(out, "    {}{HOST_SUFFIX} *{};", c.record, c.host())?;
        } else {
            writeln!(out, "    {}{HOST_SUFFIX} {};", c.record, c.host())?;
        }
    }

    let (formats, args): (Vec<&str>, Vec<String>) = f
        .params
        .iter()
        .map(|p| {
            let format = ctx.classifier.trace_format(f, p, diagnostics);
            (format.placeholder(), format.argument(&p.name))
        })
        .unzip();
    let mut trace = format!("    TRACE(\"{}\\n\"", formats.join(", "));
    for arg in &args {
        trace.push_str(", ");
        trace.push_str(arg);
    }
    writeln!(out, "{trace});")?;
    if !converted.is_empty() {
        out.push('\n');
    }

    for c in &converted {
        let name = &c.param.name;
        let host = c.host();
        let count = count_expr(f, c.param);
        match (c.returned_only, c.is_array()) {
            (false, true) => writeln!(
                out,
                "    {host} = convert_{}_array_win_to_host({name}, {count});",
                c.record
            )?,
            (false, false) if c.param.is_pointer() => {
                writeln!(out, "    convert_{}_win_to_host({name}, &{host});", c.record)?
            }
            (false, false) => writeln!(out, "    convert_{}_win_to_host(&{name}, &{host});", c.record)?,
            (true, true) => writeln!(
                out,
                "    {host} = {name} ? HeapAlloc(GetProcessHeap(), 0, {count} * sizeof(*{host})) : NULL;"
            )?,
            (true, false) => {}
        }
    }

    let args: Vec<String> = f
        .params
        .iter()
        .map(|p| match converted.iter().find(|c| std::ptr::eq(c.param, p)) {
            Some(c) if c.is_array() || !p.is_pointer() => c.host(),
            Some(c) => format!("&{}", c.host()),
            None => ctx.classifier.native_arg(p),
        })
        .collect();
    let table = f
        .params
        .first()
        .and_then(|p| ctx.classifier.dispatch_expr(p))
        .unwrap_or_else(|| "funcs".to_string());
    let call = format!("{table}.p_{}({})", f.name, args.join(", "));
    if f.returns_void() {
        writeln!(out, "    {call};")?;
    } else {
        writeln!(out, "    result = {call};")?;
    }
    if !converted.is_empty() {
        out.push('\n');
    }

    for c in converted.iter().filter(|c| c.returned_only) {
        let name = &c.param.name;
        let host = c.host();
        if c.is_array() {
            let count = count_expr(f, c.param);
            writeln!(
                out,
                "    convert_{}_array_host_to_win({host}, {name}, {count});",
                c.record
            )?;
        } else if c.param.is_pointer() {
            writeln!(out, "    convert_{}_host_to_win(&{host}, {name});", c.record)?;
        } else {
            writeln!(out, "    convert_{}_host_to_win(&{host}, &{name});", c.record)?;
        }
    }

    for c in &converted {
        let host = c.host();
        match (c.returned_only, c.is_array()) {
            (false, true) => writeln!(
                out,
                "    free_{}_array({host}, {});",
                c.record,
                count_expr(f, c.param)
            )?,
            (false, false) if c.owns_heap => writeln!(out, "    free_{}(&{host});", c.record)?,
            (true, true) => writeln!(out, "    HeapFree(GetProcessHeap(), 0, {host});")?,
            _ => {}
        }
    }

    if !f.returns_void() {
        out.push_str("    return result;\n");
    }
    out.push_str("}\n\n");
    Ok(out)
}

fn dispatch_array(
    ctx: &EmitContext<'_>,
    out: &mut String,
    name: &str,
    table: &[EntityId],
) -> Result<(), EmitError> {
    writeln!(out, "static const struct vulkan_func {name}[] = {{")?;
    for id in table {
        let function = ctx.registry.name(*id);
        writeln!(out, "    {{\"{function}\", &{}{function}}},", ctx.config.prefix)?;
    }
    out.push_str("};\n");
    Ok(())
}

/// Linear scan of one dispatch array; `NULL` when the name is unknown.
fn lookup(out: &mut String, scope: &str) -> Result<(), EmitError> {
    writeln!(out, "void *wine_vk_get_{scope}_proc_addr(const char *name)")?;
    out.push_str("{\n");
    out.push_str("    unsigned int i;\n");
    writeln!(
        out,
        "    for (i = 0; i < sizeof(vk_{scope}_dispatch_table) / sizeof(vk_{scope}_dispatch_table[0]); i++)"
    )?;
    out.push_str("    {\n");
    writeln!(
        out,
        "        if (strcmp(name, vk_{scope}_dispatch_table[i].name) == 0)"
    )?;
    out.push_str("        {\n");
    writeln!(
        out,
        "            TRACE(\"Found pName=%s in {scope} table\\n\", name);"
    )?;
    writeln!(out, "            return vk_{scope}_dispatch_table[i].func;")?;
    out.push_str("        }\n");
    out.push_str("    }\n");
    out.push_str("    return NULL;\n");
    out.push_str("}\n");
    Ok(())
}
