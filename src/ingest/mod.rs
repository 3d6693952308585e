//! Registry document loading and mapping into the unresolved model.
//!
//! The only decisions made here are textual: `bitpos` values become
//! `1 << bitpos`, hex literals keep hex formatting, value enums gain their
//! `_MAX_ENUM` sentinel, and the non-dispatchable handle define is rewritten
//! to its 64-bit form so handle traces are uniform across ABIs.

mod document;
mod error;

pub use document::{
    CommandDecl, EnumBlock, EnumBlockKind, EnumValueDecl, ExtensionDecl, ExtensionEnumDecl,
    FeatureDecl, MemberDecl, RecordDecl, RegistryDocument, RequireDecl, TypeDecl,
};
pub use error::IngestError;

use std::collections::BTreeMap;
use std::path::Path;

use crate::logging::{debug, trace};
use crate::model::{
    Alias, Constant, Entity, Enum, EnumValue, Function, FunctionPointer, Handle, Macro, Member,
    Record, Registry, Unresolved,
};
use crate::select::{AdditionValue, EnumAddition, Extension, Feature};

/// Define whose upstream text depends on pointer size.
pub const NON_DISPATCHABLE_HANDLE_DEFINE: &str = "VK_DEFINE_NON_DISPATCHABLE_HANDLE";

const NON_DISPATCHABLE_HANDLE_TEXT: &str =
    "#define VK_DEFINE_NON_DISPATCHABLE_HANDLE(object) typedef uint64_t object;";

impl RegistryDocument {
    pub fn from_json_str(text: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, IngestError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a document, picking the format from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Everything ingest produces: the registry plus the groupings that select
/// from it.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub registry: Registry<Unresolved>,
    pub features: Vec<Feature>,
    pub extensions: Vec<Extension>,
}

/// Map a document into an unresolved registry.
pub fn ingest(document: &RegistryDocument) -> Result<Ingested, IngestError> {
    let mut registry = Registry::new();

    let mut value_enums: BTreeMap<&str, Enum> = BTreeMap::new();
    for block in &document.enums {
        match block.kind {
            EnumBlockKind::Constants => {
                for v in &block.values {
                    let value = v
                        .value
                        .clone()
                        .ok_or_else(|| IngestError::MissingEnumValue(v.name.clone()))?;
                    registry.insert(Entity::Constant(Constant {
                        name: v.name.clone(),
                        value,
                    }))?;
                }
            }
            EnumBlockKind::Enum | EnumBlockKind::Bitmask => {
                value_enums.insert(&block.name, enum_from_block(block)?);
            }
        }
    }

    for decl in &document.types {
        match decl {
            TypeDecl::Basetype { name, ty } => {
                registry.insert(Entity::Alias(alias(name, ty, false, None)))?;
            }
            TypeDecl::Bitmask { name, ty, requires } => {
                registry.insert(Entity::Alias(alias(name, ty, true, requires.clone())))?;
            }
            TypeDecl::Define { name, value } => {
                let text = if name == NON_DISPATCHABLE_HANDLE_DEFINE {
                    NON_DISPATCHABLE_HANDLE_TEXT.to_string()
                } else {
                    value.clone()
                };
                registry.insert(Entity::Macro(Macro {
                    name: name.clone(),
                    text,
                }))?;
            }
            TypeDecl::Enum { name } => {
                let e = value_enums.remove(name.as_str()).unwrap_or_else(|| Enum {
                    name: name.clone(),
                    values: Vec::new(),
                    bitmask: name.contains("FlagBits"),
                    defined: false,
                });
                registry.insert(Entity::Enum(e))?;
            }
            TypeDecl::Funcpointer {
                name,
                return_type,
                params,
            } => {
                registry.insert(Entity::FunctionPointer(FunctionPointer {
                    name: name.clone(),
                    return_type: return_type.clone(),
                    params: params.iter().map(member).collect(),
                }))?;
            }
            TypeDecl::Handle { name, ty, parent } => {
                registry.insert(Entity::Handle(Handle {
                    name: name.clone(),
                    dispatchable: ty == "VK_DEFINE_HANDLE",
                    parent_name: parent.clone(),
                    parent: (),
                }))?;
            }
            TypeDecl::Struct(r) => {
                registry.insert(Entity::Record(record(r, false)))?;
            }
            TypeDecl::Union(r) => {
                registry.insert(Entity::Record(record(r, true)))?;
            }
            TypeDecl::External { name } => registry.declare_platform_type(name.clone())?,
            TypeDecl::Include { name } => trace!(name = %name, "skipping include"),
        }
    }

    // Value blocks the type section never names are still usable.
    for (_, e) in value_enums {
        registry.insert(Entity::Enum(e))?;
    }

    for command in &document.commands {
        registry.insert(Entity::Function(Function {
            name: command.name.clone(),
            return_type: command.return_type.clone(),
            return_ty: (),
            params: command.params.iter().map(member).collect(),
            extension: None,
        }))?;
    }

    let features = document
        .features
        .iter()
        .map(|f| Feature {
            name: f.name.clone(),
            commands: f.commands.clone(),
            types: f.types.clone(),
        })
        .collect();

    let extensions = document.extensions.iter().map(extension).collect();

    debug!(
        entities = registry.len(),
        commands = document.commands.len(),
        "registry ingested"
    );
    Ok(Ingested {
        registry,
        features,
        extensions,
    })
}

fn alias(name: &str, underlying: &str, bitmask: bool, companion: Option<String>) -> Alias<Unresolved> {
    Alias {
        name: name.to_string(),
        underlying: underlying.to_string(),
        underlying_ty: (),
        bitmask,
        companion_name: companion,
        companion: (),
    }
}

fn enum_from_block(block: &EnumBlock) -> Result<Enum, IngestError> {
    let mut e = Enum {
        name: block.name.clone(),
        values: Vec::with_capacity(block.values.len() + 1),
        bitmask: block.kind == EnumBlockKind::Bitmask,
        defined: false,
    };
    for v in &block.values {
        let value = match (&v.value, v.bitpos) {
            (Some(text), _) => {
                let value = parse_enum_value(text).ok_or_else(|| IngestError::InvalidEnumValue {
                    name: v.name.clone(),
                    value: text.clone(),
                })?;
                EnumValue::new(&v.name, value, text.contains("0x"))
            }
            (None, Some(bitpos)) => EnumValue::new(&v.name, bit_value(&v.name, bitpos)?, true),
            (None, None) => return Err(IngestError::MissingEnumValue(v.name.clone())),
        };
        e.add(value);
    }
    e.define();
    Ok(e)
}

pub(crate) fn bit_value(name: &str, bitpos: u32) -> Result<i64, IngestError> {
    1i64.checked_shl(bitpos)
        .filter(|v| *v > 0)
        .ok_or_else(|| IngestError::InvalidEnumValue {
            name: name.to_string(),
            value: format!("bitpos {bitpos}"),
        })
}

/// Parse a decimal or `0x` enum literal, optionally negative.
fn parse_enum_value(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn member(decl: &MemberDecl) -> Member<Unresolved> {
    Member {
        name: decl.name.clone(),
        type_name: decl.ty.clone(),
        ty: (),
        pointer: decl.pointer.clone(),
        is_const: decl.is_const,
        array_len: decl.array_len.clone(),
        len: count_member(decl.len.as_deref()),
    }
}

/// `"enabledLayerCount,null-terminated"` -> `enabledLayerCount`; a bare
/// `null-terminated` string has no count sibling.
fn count_member(len: Option<&str>) -> Option<String> {
    let first = len?.split(',').next()?.trim();
    if first.is_empty() || first == "null-terminated" {
        None
    } else {
        Some(first.to_string())
    }
}

fn record(decl: &RecordDecl, union: bool) -> Record<Unresolved> {
    Record {
        name: decl.name.clone(),
        union,
        returned_only: decl.returnedonly,
        members: decl.members.iter().map(member).collect(),
    }
}

fn extension(decl: &ExtensionDecl) -> Extension {
    let enums = decl
        .require
        .enums
        .iter()
        .filter_map(|e| {
            // Additions without `extends` only define name and version
            // constants.
            let extends = e.extends.clone()?;
            let value = match (e.bitpos, e.offset) {
                (Some(bitpos), _) => AdditionValue::BitPos(bitpos),
                (None, Some(offset)) => AdditionValue::Offset {
                    offset,
                    negative: e.dir.is_some(),
                },
                (None, None) => return None,
            };
            Some(EnumAddition {
                name: e.name.clone(),
                extends,
                value,
            })
        })
        .collect();

    Extension {
        name: decl.name.clone(),
        number: decl.number,
        requires: decl.requires.clone(),
        commands: decl.require.commands.clone(),
        types: decl.require.types.clone(),
        enums,
    }
}
