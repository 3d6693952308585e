//! Entity kinds stored in the registry arena.

use std::fmt;

use super::{Resolved, Stage, TypeRef};

/// A struct member, function parameter or function-pointer parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Member<S: Stage> {
    pub name: String,
    /// Type name as written in the registry.
    pub type_name: String,
    /// Resolved type; `()` until the registry is resolved.
    pub ty: S::Ty,
    /// Pointer decoration following the type (`*`, `**`, `* const*`).
    pub pointer: Option<String>,
    pub is_const: bool,
    /// Fixed array length, a literal or a constant name.
    pub array_len: Option<String>,
    /// Name of the sibling member/parameter holding the element count.
    pub len: Option<String>,
}

/// Parameters have exactly the shape of members.
pub type Param<S> = Member<S>;

impl<S: Stage> Member<S> {
    pub fn is_pointer(&self) -> bool {
        self.pointer.is_some()
    }

    /// Pointer to a run of elements whose count lives in a sibling.
    pub fn is_dynamic_array(&self) -> bool {
        self.len.is_some()
    }

    pub fn is_fixed_array(&self) -> bool {
        self.array_len.is_some()
    }
}

impl Member<Resolved> {
    pub fn entity(&self) -> Option<super::EntityId> {
        self.ty.entity()
    }
}

/// `typedef <underlying> <name>;` for base types and bitmasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias<S: Stage> {
    pub name: String,
    pub underlying: String,
    pub underlying_ty: S::Ty,
    pub bitmask: bool,
    /// Value enum paired with a bitmask (`VkFooFlags` -> `VkFooFlagBits`).
    pub companion_name: Option<String>,
    pub companion: S::Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: String,
}

/// Preformatted preprocessor text, emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
    pub hex: bool,
}

impl EnumValue {
    pub fn new(name: impl Into<String>, value: i64, hex: bool) -> Self {
        Self {
            name: name.into(),
            value,
            hex,
        }
    }
}

/// Value of the sentinel that forces enums to 32 bits.
pub const MAX_ENUM_VALUE: i64 = 0x7fff_ffff;

/// `VkImageLayout` -> `VK_IMAGE_LAYOUT_MAX_ENUM`.
///
/// An underscore goes between a lowercase letter, digit or underscore and the
/// uppercase letter or digit that follows it. Matches do not overlap, so
/// `VkFoo2D` becomes `VK_FOO_2D` rather than `VK_FOO_2_D`.
pub fn max_enum_name(enum_name: &str) -> String {
    let chars: Vec<char> = enum_name.chars().collect();
    let mut out = String::with_capacity(enum_name.len() + 16);
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        out.push(c);
        let starts_match = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_';
        match chars.get(i + 1) {
            Some(&next) if starts_match && (next.is_ascii_uppercase() || next.is_ascii_digit()) => {
                out.push('_');
                out.push(next);
                i += 2;
            }
            _ => i += 1,
        }
    }
    format!("{}_MAX_ENUM", out.to_ascii_uppercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub name: String,
    pub values: Vec<EnumValue>,
    pub bitmask: bool,
    /// False when only the type section names this enum.
    pub defined: bool,
}

impl Enum {
    /// Append a value. Extensions add values after ingest, in any order.
    pub fn add(&mut self, value: EnumValue) {
        self.values.push(value);
    }

    /// Mark the enum as having a values block and append its `_MAX_ENUM`
    /// sentinel. Calling this on an already defined enum does nothing.
    pub fn define(&mut self) {
        if self.defined {
            return;
        }
        self.defined = true;
        self.values
            .push(EnumValue::new(max_enum_name(&self.name), MAX_ENUM_VALUE, true));
    }

    /// Values ordered for emission. The sort is stable, so equal values keep
    /// their registry order.
    pub fn sorted_values(&self) -> Vec<&EnumValue> {
        let mut values: Vec<&EnumValue> = self.values.iter().collect();
        values.sort_by_key(|v| v.value);
        values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handle<S: Stage> {
    pub name: String,
    /// Dispatchable handles are pointers to objects that carry a dispatch
    /// table; the others are plain 64-bit tokens.
    pub dispatchable: bool,
    pub parent_name: Option<String>,
    pub parent: S::Link,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPointer<S: Stage> {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param<S>>,
}

/// A struct or union.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<S: Stage> {
    pub name: String,
    pub union: bool,
    /// Filled in by the API rather than by the caller.
    pub returned_only: bool,
    pub members: Vec<Member<S>>,
}

impl<S: Stage> Record<S> {
    pub fn member(&self, name: &str) -> Option<&Member<S>> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function<S: Stage> {
    pub name: String,
    pub return_type: String,
    pub return_ty: S::Ty,
    pub params: Vec<Param<S>>,
    /// Extension that pulled this function in; `None` for the baseline.
    pub extension: Option<String>,
}

impl<S: Stage> Function<S> {
    pub fn returns_void(&self) -> bool {
        self.return_type == "void"
    }

    pub fn param(&self, name: &str) -> Option<&Param<S>> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl Function<Resolved> {
    pub fn return_entity(&self) -> Option<super::EntityId> {
        match self.return_ty {
            TypeRef::Entity(id) => Some(id),
            TypeRef::Primitive(_) => None,
        }
    }
}

/// Every kind of declaration the registry can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity<S: Stage> {
    Alias(Alias<S>),
    Constant(Constant),
    Macro(Macro),
    Enum(Enum),
    Handle(Handle<S>),
    FunctionPointer(FunctionPointer<S>),
    Record(Record<S>),
    Function(Function<S>),
}

/// Discriminant of [`Entity`], handy for logging and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Alias,
    Constant,
    Macro,
    Enum,
    Handle,
    FunctionPointer,
    Record,
    Function,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Alias => "alias",
            EntityKind::Constant => "constant",
            EntityKind::Macro => "macro",
            EntityKind::Enum => "enum",
            EntityKind::Handle => "handle",
            EntityKind::FunctionPointer => "function pointer",
            EntityKind::Record => "record",
            EntityKind::Function => "function",
        };
        f.write_str(s)
    }
}

impl<S: Stage> Entity<S> {
    pub fn name(&self) -> &str {
        match self {
            Entity::Alias(a) => &a.name,
            Entity::Constant(c) => &c.name,
            Entity::Macro(m) => &m.name,
            Entity::Enum(e) => &e.name,
            Entity::Handle(h) => &h.name,
            Entity::FunctionPointer(fp) => &fp.name,
            Entity::Record(r) => &r.name,
            Entity::Function(f) => &f.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Alias(_) => EntityKind::Alias,
            Entity::Constant(_) => EntityKind::Constant,
            Entity::Macro(_) => EntityKind::Macro,
            Entity::Enum(_) => EntityKind::Enum,
            Entity::Handle(_) => EntityKind::Handle,
            Entity::FunctionPointer(_) => EntityKind::FunctionPointer,
            Entity::Record(_) => EntityKind::Record,
            Entity::Function(_) => EntityKind::Function,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_enum_name() {
        assert_eq!(max_enum_name("VkImageLayout"), "VK_IMAGE_LAYOUT_MAX_ENUM");
        assert_eq!(max_enum_name("VkFoo2D"), "VK_FOO_2D_MAX_ENUM");
        assert_eq!(
            max_enum_name("VkColorSpaceKHR"),
            "VK_COLOR_SPACE_KHR_MAX_ENUM"
        );
    }

    #[test]
    fn test_define_appends_sentinel_once() {
        let mut e = Enum {
            name: "VkFrontFace".to_string(),
            values: Vec::new(),
            bitmask: false,
            defined: false,
        };
        e.define();
        e.define();
        assert!(e.defined);
        assert_eq!(e.values.len(), 1);
        assert_eq!(e.values[0].value, MAX_ENUM_VALUE);
        assert!(e.values[0].hex);
    }
}
