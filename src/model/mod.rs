//! In-memory model of an API registry.
//!
//! Every declared entity lives in a single arena owned by [`Registry`] and is
//! addressed by a stable [`EntityId`]. The registry is built in two stages:
//!
//! - [`Unresolved`]: entities carry only the *names* of the types they refer to.
//! - [`Resolved`]: every name has been back-filled with a [`TypeRef`].
//!
//! Layout and conversion analysis only accept a `Registry<Resolved>`, so it is
//! impossible to ask alignment questions before resolution has run.
//!
//! # Module Organization
//!
//! - [`entity`]: the closed set of entity kinds
//! - [`registry`]: the arena, name lookup and the resolve step
//! - [`error`]: error types for model construction

mod entity;
mod error;
mod registry;

pub use entity::{
    Alias, Constant, Entity, EntityKind, Enum, EnumValue, Function, FunctionPointer, Handle, Macro,
    Member, Param, Record, MAX_ENUM_VALUE, max_enum_name,
};
pub use error::ModelError;
pub use registry::Registry;
pub(crate) use registry::parse_c_integer;

use std::fmt;

/// Stable index of an entity inside a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    /// Position of the entity in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Unresolved {}
    impl Sealed for super::Resolved {}
}

/// Resolution stage of a [`Registry`].
pub trait Stage: sealed::Sealed + Clone + fmt::Debug {
    /// What a member or parameter knows about its type.
    type Ty: Clone + fmt::Debug + PartialEq;
    /// What an entity knows about another entity it links to by name.
    type Link: Clone + fmt::Debug + PartialEq;
}

/// Freshly ingested: type references are names only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved;

impl Stage for Unresolved {
    type Ty = ();
    type Link = ();
}

/// Every type name has been resolved against the whole registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved;

impl Stage for Resolved {
    type Ty = TypeRef;
    type Link = Option<EntityId>;
}

/// A resolved type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Built-in C scalar or a platform type declared by the registry.
    Primitive(Primitive),
    /// A registry entity.
    Entity(EntityId),
}

impl TypeRef {
    /// The entity behind this reference, if any.
    pub fn entity(self) -> Option<EntityId> {
        match self {
            TypeRef::Entity(id) => Some(id),
            TypeRef::Primitive(_) => None,
        }
    }
}

/// Built-in scalar types that need no registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Char,
    Float,
    Double,
    Int,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    SizeT,
    /// Opaque platform type (`HWND`, `HINSTANCE`, ...), pointer sized.
    Platform,
}

impl Primitive {
    /// Map a C type name to a built-in primitive.
    pub fn from_c_name(name: &str) -> Option<Self> {
        let prim = match name {
            "void" => Primitive::Void,
            "char" => Primitive::Char,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "int" => Primitive::Int,
            "int8_t" => Primitive::Int8,
            "uint8_t" => Primitive::Uint8,
            "int16_t" => Primitive::Int16,
            "uint16_t" => Primitive::Uint16,
            "int32_t" => Primitive::Int32,
            "uint32_t" => Primitive::Uint32,
            "int64_t" => Primitive::Int64,
            "uint64_t" => Primitive::Uint64,
            "size_t" => Primitive::SizeT,
            _ => return None,
        };
        Some(prim)
    }

    /// Eight-byte integers, the scalars whose alignment differs between ABIs.
    pub fn is_wide_integer(self) -> bool {
        matches!(self, Primitive::Int64 | Primitive::Uint64)
    }
}
