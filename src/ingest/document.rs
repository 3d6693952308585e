//! Serde shape of the registry document.
//!
//! The document mirrors the sections of an upstream API registry: `types`,
//! `enums`, `commands`, `features` and `extensions`. It can be written as JSON
//! or TOML.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub enums: Vec<EnumBlock>,
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
    #[serde(default)]
    pub features: Vec<FeatureDecl>,
    #[serde(default)]
    pub extensions: Vec<ExtensionDecl>,
}

/// One entry of the `types` section, tagged by its `category`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum TypeDecl {
    /// `typedef uint32_t VkFlags;`
    Basetype {
        name: String,
        #[serde(rename = "type")]
        ty: String,
    },
    /// `typedef VkFlags VkCullModeFlags;` optionally paired with a value enum.
    Bitmask {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        requires: Option<String>,
    },
    /// Preprocessor text emitted verbatim.
    Define { name: String, value: String },
    /// Name of an enum whose values live in the `enums` section.
    Enum { name: String },
    Funcpointer {
        name: String,
        #[serde(rename = "return")]
        return_type: String,
        #[serde(default)]
        params: Vec<MemberDecl>,
    },
    Handle {
        name: String,
        /// `VK_DEFINE_HANDLE` or `VK_DEFINE_NON_DISPATCHABLE_HANDLE`.
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        parent: Option<String>,
    },
    Struct(RecordDecl),
    Union(RecordDecl),
    /// Platform type provided by a system header (`HWND`, `HINSTANCE`).
    External { name: String },
    /// Header inclusion, ignored.
    Include { name: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordDecl {
    pub name: String,
    #[serde(default)]
    pub returnedonly: bool,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemberDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub pointer: Option<String>,
    #[serde(default, rename = "const")]
    pub is_const: bool,
    #[serde(default)]
    pub array_len: Option<String>,
    /// Upstream `len` attribute: `"count"`, `"count,null-terminated"` or
    /// `"null-terminated"`.
    #[serde(default)]
    pub len: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumBlockKind {
    /// API constants (`#define`s).
    #[default]
    Constants,
    Enum,
    Bitmask,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnumBlock {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: EnumBlockKind,
    #[serde(default)]
    pub values: Vec<EnumValueDecl>,
}

/// A value carries either a literal `value` or a `bitpos`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnumValueDecl {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub bitpos: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDecl {
    pub name: String,
    #[serde(rename = "return")]
    pub return_type: String,
    #[serde(default)]
    pub params: Vec<MemberDecl>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeatureDecl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionDecl {
    pub name: String,
    pub number: u32,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub require: RequireDecl,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequireDecl {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub enums: Vec<ExtensionEnumDecl>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionEnumDecl {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub bitpos: Option<u32>,
    #[serde(default)]
    pub offset: Option<i64>,
    /// `"-"` marks a value counted in the negative direction.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}
