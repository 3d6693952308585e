//! C declarations shared by every artifact.

use crate::abi::AbiAnalysis;
use crate::model::{
    Alias, Constant, Enum, EnumValue, Function, FunctionPointer, Handle, Macro, Member, Record,
    Registry, Resolved,
};

/// Suffix of the host-layout copy of a record.
pub const HOST_SUFFIX: &str = "_host";

/// How a member is declared inside a record definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStyle {
    Plain,
    /// `WINE_VK_ALIGN(8)` on members whose alignment diverges.
    Aligned,
    /// Record members needing conversion use their `_host` type.
    Host,
}

/// `const VkFoo *pFoo`, `float blendConstants[4]`, `VkDeviceSize WINE_VK_ALIGN(8) size`.
pub fn member(
    registry: &Registry<Resolved>,
    analysis: &AbiAnalysis,
    m: &Member<Resolved>,
    style: MemberStyle,
) -> String {
    let mut text = String::new();
    if m.is_const {
        text.push_str("const ");
    }
    text.push_str(&m.type_name);
    if style == MemberStyle::Host && analysis.member_needs_conversion(m) {
        text.push_str(HOST_SUFFIX);
    }
    match &m.pointer {
        Some(pointer) => {
            text.push(' ');
            text.push_str(pointer);
            text.push_str(&m.name);
        }
        None if style == MemberStyle::Aligned && analysis.member_needs_alignment(registry, m) => {
            text.push_str(" WINE_VK_ALIGN(8) ");
            text.push_str(&m.name);
        }
        None => {
            text.push(' ');
            text.push_str(&m.name);
        }
    }
    if let Some(len) = &m.array_len {
        text.push_str(&format!("[{len}]"));
    }
    text
}

/// Parameter declaration; parameters are never annotated.
pub fn param(m: &Member<Resolved>) -> String {
    let mut text = String::new();
    if m.is_const {
        text.push_str("const ");
    }
    text.push_str(&m.type_name);
    match &m.pointer {
        Some(pointer) => text.push_str(&format!(" {pointer}{}", m.name)),
        None => text.push_str(&format!(" {}", m.name)),
    }
    if let Some(len) = &m.array_len {
        text.push_str(&format!("[{len}]"));
    }
    text
}

/// `VkResult   WINAPI wine_vkFoo(VkDevice device) DECLSPEC_HIDDEN`.
pub fn prototype(
    f: &Function<Resolved>,
    call_conv: Option<&str>,
    prefix: &str,
    postfix: Option<&str>,
) -> String {
    let mut text = format!("{:<10}", f.return_type);
    if let Some(cc) = call_conv {
        text.push(' ');
        text.push_str(cc);
    }
    let params: Vec<String> = f.params.iter().map(param).collect();
    text.push_str(&format!(" {prefix}{}({})", f.name, params.join(", ")));
    if let Some(postfix) = postfix {
        text.push(' ');
        text.push_str(postfix);
    }
    text
}

/// Function pointer field `VkResult (*p_vkFoo)(VkDevice, const VkBar_host *)`.
///
/// With `host` set, parameters needing conversion take their `_host` type.
pub fn pfn(analysis: &AbiAnalysis, f: &Function<Resolved>, host: bool) -> String {
    let params: Vec<String> = f
        .params
        .iter()
        .map(|p| {
            let mut text = String::new();
            if p.is_const {
                text.push_str("const ");
            }
            text.push_str(&p.type_name);
            if host && analysis.member_needs_conversion(p) {
                text.push_str(HOST_SUFFIX);
            }
            if let Some(pointer) = &p.pointer {
                text.push(' ');
                text.push_str(pointer);
            }
            if let Some(len) = &p.array_len {
                text.push_str(&format!("[{len}]"));
            }
            text
        })
        .collect();
    format!("{} (*p_{})({})", f.return_type, f.name, params.join(", "))
}

pub fn constant(c: &Constant) -> String {
    format!("#define {} {}\n", c.name, c.value)
}

pub fn macro_definition(m: &Macro) -> String {
    format!("{}\n", m.text)
}

pub fn handle(h: &Handle<Resolved>) -> String {
    let kind = if h.dispatchable {
        "VK_DEFINE_HANDLE"
    } else {
        "VK_DEFINE_NON_DISPATCHABLE_HANDLE"
    };
    format!("{kind}({})\n", h.name)
}

pub fn alias(a: &Alias<Resolved>) -> String {
    format!("typedef {} {};\n", a.underlying, a.name)
}

fn enum_value(v: &EnumValue) -> String {
    if !v.hex {
        return format!("{} = {}", v.name, v.value);
    }
    // Hex values are 32-bit words; negative ones print as their bit pattern.
    match u32::try_from(v.value).or_else(|_| i32::try_from(v.value).map(|n| n as u32)) {
        Ok(bits) => format!("{} = 0x{:08X}", v.name, bits),
        Err(_) => format!("{} = 0x{:016X}", v.name, v.value),
    }
}

/// Enum definition with values sorted; extensions append out of order.
pub fn enumeration(e: &Enum) -> String {
    let mut text = format!("typedef enum {} {{\n", e.name);
    for v in e.sorted_values() {
        text.push_str(&format!("    {},\n", enum_value(v)));
    }
    text.push_str(&format!("}} {};\n\n", e.name));
    text
}

pub fn function_pointer(fp: &FunctionPointer<Resolved>) -> String {
    let mut text = format!("typedef {} (VKAPI_PTR *{})(\n", fp.return_type, fp.name);
    if fp.params.is_empty() {
        text.push_str("void");
    } else {
        let params: Vec<String> = fp.params.iter().map(|p| format!("    {}", param(p))).collect();
        text.push_str(&params.join(",\n"));
    }
    text.push_str(");\n");
    text
}

/// Struct or union definition, optionally renamed with `postfix`.
pub fn record(
    registry: &Registry<Resolved>,
    analysis: &AbiAnalysis,
    r: &Record<Resolved>,
    style: MemberStyle,
    postfix: &str,
) -> String {
    let keyword = if r.union { "union" } else { "struct" };
    let mut text = format!("typedef {keyword} {}{postfix}\n{{\n", r.name);
    for m in &r.members {
        text.push_str(&format!("    {};\n", member(registry, analysis, m, style)));
    }
    text.push_str(&format!("}} {}{postfix};\n\n", r.name));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::model::{Entity, Unresolved};

    fn m(name: &str, ty: &str) -> Member<Unresolved> {
        Member {
            name: name.to_string(),
            type_name: ty.to_string(),
            ty: (),
            pointer: None,
            is_const: false,
            array_len: None,
            len: None,
        }
    }

    fn registry() -> Registry<Resolved> {
        let mut reg = Registry::new();
        reg.insert(Entity::Alias(Alias {
            name: "VkDeviceSize".to_string(),
            underlying: "uint64_t".to_string(),
            underlying_ty: (),
            bitmask: false,
            companion_name: None,
            companion: (),
        }))
        .unwrap();
        reg.insert(Entity::Record(Record {
            name: "VkMappedMemoryRange".to_string(),
            union: false,
            returned_only: false,
            members: vec![
                Member {
                    pointer: Some("*".to_string()),
                    is_const: true,
                    ..m("pNext", "void")
                },
                m("offset", "VkDeviceSize"),
                Member {
                    array_len: Some("4".to_string()),
                    ..m("pad", "uint32_t")
                },
            ],
        }))
        .unwrap();
        reg.insert(Entity::Function(Function {
            name: "vkFlushMappedMemoryRanges".to_string(),
            return_type: "VkResult".to_string(),
            return_ty: (),
            params: vec![
                m("memoryRangeCount", "uint32_t"),
                Member {
                    pointer: Some("*".to_string()),
                    is_const: true,
                    len: Some("memoryRangeCount".to_string()),
                    ..m("pMemoryRanges", "VkMappedMemoryRange")
                },
            ],
            extension: None,
        }))
        .unwrap();
        reg.declare_platform_type("VkResult").unwrap();
        reg.resolve(&mut Diagnostics::new()).unwrap()
    }

    #[test]
    fn test_record_styles() {
        let reg = registry();
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let r = reg.record(reg.lookup("VkMappedMemoryRange").unwrap()).unwrap();

        assert_eq!(
            record(&reg, &analysis, r, MemberStyle::Aligned, ""),
            "typedef struct VkMappedMemoryRange\n{\n    const void *pNext;\n    \
             VkDeviceSize WINE_VK_ALIGN(8) offset;\n    uint32_t pad[4];\n} VkMappedMemoryRange;\n\n"
        );
        assert!(record(&reg, &analysis, r, MemberStyle::Host, HOST_SUFFIX)
            .starts_with("typedef struct VkMappedMemoryRange_host\n"));
    }

    #[test]
    fn test_function_declarations() {
        let reg = registry();
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let f = reg
            .function(reg.lookup("vkFlushMappedMemoryRanges").unwrap())
            .unwrap();

        assert_eq!(
            prototype(f, Some("WINAPI"), "wine_", Some("DECLSPEC_HIDDEN")),
            "VkResult   WINAPI wine_vkFlushMappedMemoryRanges(uint32_t memoryRangeCount, \
             const VkMappedMemoryRange *pMemoryRanges) DECLSPEC_HIDDEN"
        );
        assert_eq!(
            pfn(&analysis, f, true),
            "VkResult (*p_vkFlushMappedMemoryRanges)(uint32_t, const VkMappedMemoryRange_host *)"
        );
        assert_eq!(
            pfn(&analysis, f, false),
            "VkResult (*p_vkFlushMappedMemoryRanges)(uint32_t, const VkMappedMemoryRange *)"
        );
    }

    #[test]
    fn test_enum_values_sorted_and_formatted() {
        let mut e = Enum {
            name: "VkQueueFlagBits".to_string(),
            values: vec![
                EnumValue::new("VK_QUEUE_COMPUTE_BIT", 2, true),
                EnumValue::new("VK_QUEUE_GRAPHICS_BIT", 1, true),
            ],
            bitmask: true,
            defined: false,
        };
        e.define();
        assert_eq!(
            enumeration(&e),
            "typedef enum VkQueueFlagBits {\n    VK_QUEUE_GRAPHICS_BIT = 0x00000001,\n    \
             VK_QUEUE_COMPUTE_BIT = 0x00000002,\n    VK_QUEUE_FLAG_BITS_MAX_ENUM = 0x7FFFFFFF,\n\
             } VkQueueFlagBits;\n\n"
        );
    }

    #[test]
    fn test_hex_values_print_as_32_bit_words() {
        let value = |v: i64| enum_value(&EnumValue::new("VK_X", v, true));
        assert_eq!(value(-1), "VK_X = 0xFFFFFFFF");
        assert_eq!(value(i64::from(i32::MIN)), "VK_X = 0x80000000");
        assert_eq!(value(0x8000_0000), "VK_X = 0x80000000");
        assert_eq!(value(0x20), "VK_X = 0x00000020");
        assert_eq!(value(0x1_0000_0000), "VK_X = 0x0000000100000000");
        assert_eq!(enum_value(&EnumValue::new("VK_Y", -3, false)), "VK_Y = -3");
    }
}
