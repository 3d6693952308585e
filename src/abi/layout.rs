//! Concrete struct layouts for the two 32-bit ABIs.
//!
//! The only scalar whose placement differs is the 8-byte one: Win32 aligns
//! `uint64_t`, `int64_t` and `double` to 8 inside structs, the i386 System V
//! host ABI aligns them to 4. Everything else (pointers, `size_t`,
//! dispatchable handles, platform types) is 4 bytes on both sides.

use std::collections::HashMap;
use std::fmt;

use crate::model::{Entity, EntityId, Member, Primitive, Registry, Resolved, TypeRef};

use super::LayoutError;
use super::buffer::align_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    /// The caller's layout.
    Win32,
    /// The native driver's layout.
    Host,
}

impl Abi {
    fn wide_align(self) -> u32 {
        match self {
            Abi::Win32 => 8,
            Abi::Host => 4,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abi::Win32 => f.write_str("win32"),
            Abi::Host => f.write_str("host"),
        }
    }
}

/// Placement of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u32,
    /// Total size, including every element of a fixed array.
    pub size: u32,
    pub align: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub size: u32,
    pub align: u32,
    pub fields: Vec<FieldLayout>,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Memoizing layout calculator.
pub struct LayoutEngine<'r> {
    registry: &'r Registry<Resolved>,
    cache: HashMap<(EntityId, Abi), RecordLayout>,
    in_progress: Vec<EntityId>,
}

impl<'r> LayoutEngine<'r> {
    pub fn new(registry: &'r Registry<Resolved>) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry<Resolved> {
        self.registry
    }

    pub fn record_layout(&mut self, id: EntityId, abi: Abi) -> Result<RecordLayout, LayoutError> {
        if let Some(layout) = self.cache.get(&(id, abi)) {
            return Ok(layout.clone());
        }
        let registry = self.registry;
        let record = registry
            .record(id)
            .ok_or_else(|| LayoutError::NotARecord(registry.name(id).to_string()))?;
        if self.in_progress.contains(&id) {
            return Err(LayoutError::CyclicDependency(record.name.clone()));
        }
        self.in_progress.push(id);

        let mut fields = Vec::with_capacity(record.members.len());
        let mut offset = 0;
        let mut size = 0;
        let mut align = 1;
        for m in &record.members {
            let (field_size, field_align) = match self.member_layout(&record.name, m, abi) {
                Ok(v) => v,
                Err(e) => {
                    self.in_progress.retain(|i| *i != id);
                    return Err(e);
                }
            };
            align = align.max(field_align);
            let field_offset = if record.union {
                size = size.max(field_size);
                0
            } else {
                let at = align_to(offset, field_align);
                offset = at + field_size;
                size = offset;
                at
            };
            fields.push(FieldLayout {
                name: m.name.clone(),
                offset: field_offset,
                size: field_size,
                align: field_align,
            });
        }
        self.in_progress.retain(|i| *i != id);

        let layout = RecordLayout {
            size: align_to(size, align),
            align,
            fields,
        };
        self.cache.insert((id, abi), layout.clone());
        Ok(layout)
    }

    fn member_layout(
        &mut self,
        record: &str,
        m: &Member<Resolved>,
        abi: Abi,
    ) -> Result<(u32, u32), LayoutError> {
        let (size, align) = if m.is_pointer() {
            (4, 4)
        } else {
            self.type_layout(record, m, m.ty, abi)?
        };
        match m.array_len.as_deref() {
            None => Ok((size, align)),
            Some(len) => {
                let count = crate::model::parse_c_integer(len)
                    .or_else(|| self.registry.constant_value(len))
                    .ok_or_else(|| LayoutError::UnknownArrayLength {
                        record: record.to_string(),
                        member: m.name.clone(),
                        len: len.to_string(),
                    })?;
                Ok((size * count as u32, align))
            }
        }
    }

    fn type_layout(
        &mut self,
        record: &str,
        m: &Member<Resolved>,
        ty: TypeRef,
        abi: Abi,
    ) -> Result<(u32, u32), LayoutError> {
        let registry = self.registry;
        let id = match ty {
            TypeRef::Primitive(p) => return primitive_layout(p, abi).ok_or_else(|| r#unsized(record, m)),
            TypeRef::Entity(id) => id,
        };
        match registry.get(id) {
            Some(Entity::Alias(a)) => self.type_layout(record, m, a.underlying_ty, abi),
            Some(Entity::Enum(_)) => Ok((4, 4)),
            Some(Entity::Handle(h)) if h.dispatchable => Ok((4, 4)),
            Some(Entity::Handle(_)) => Ok((8, abi.wide_align())),
            Some(Entity::FunctionPointer(_)) => Ok((4, 4)),
            Some(Entity::Record(_)) => {
                let layout = self.record_layout(id, abi)?;
                Ok((layout.size, layout.align))
            }
            Some(other) => Err(LayoutError::NotAType {
                record: record.to_string(),
                member: m.name.clone(),
                kind: other.kind(),
            }),
            None => Err(r#unsized(record, m)),
        }
    }
}

fn r#unsized(record: &str, m: &Member<Resolved>) -> LayoutError {
    LayoutError::Unsized {
        record: record.to_string(),
        member: m.name.clone(),
        type_name: m.type_name.clone(),
    }
}

/// Size and alignment of a scalar; `None` for `void`.
pub fn primitive_layout(p: Primitive, abi: Abi) -> Option<(u32, u32)> {
    let layout = match p {
        Primitive::Void => return None,
        Primitive::Char | Primitive::Int8 | Primitive::Uint8 => (1, 1),
        Primitive::Int16 | Primitive::Uint16 => (2, 2),
        Primitive::Float | Primitive::Int | Primitive::Int32 | Primitive::Uint32 => (4, 4),
        Primitive::SizeT | Primitive::Platform => (4, 4),
        Primitive::Int64 | Primitive::Uint64 | Primitive::Double => (8, abi.wide_align()),
    };
    Some(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::model::{Alias, Constant, Handle, Record, Unresolved};

    fn member(name: &str, ty: &str) -> Member<Unresolved> {
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
        reg.insert(Entity::Handle(Handle {
            name: "VkBuffer".to_string(),
            dispatchable: false,
            parent_name: None,
            parent: (),
        }))
        .unwrap();
        reg.insert(Entity::Constant(Constant {
            name: "VK_UUID_SIZE".to_string(),
            value: "16".to_string(),
        }))
        .unwrap();
        let mut p_next = member("pNext", "void");
        p_next.pointer = Some("*".to_string());
        reg.insert(Entity::Record(Record {
            name: "VkMappedMemoryRange".to_string(),
            union: false,
            returned_only: false,
            members: vec![
                member("sType", "uint32_t"),
                p_next,
                member("memory", "VkBuffer"),
                member("offset", "VkDeviceSize"),
            ],
        }))
        .unwrap();
        let mut uuid = member("uuid", "uint8_t");
        uuid.array_len = Some("VK_UUID_SIZE".to_string());
        reg.insert(Entity::Record(Record {
            name: "VkUuid".to_string(),
            union: false,
            returned_only: false,
            members: vec![member("id", "uint32_t"), uuid],
        }))
        .unwrap();
        reg.insert(Entity::Record(Record {
            name: "VkValue".to_string(),
            union: true,
            returned_only: false,
            members: vec![member("f", "float"), member("u", "uint64_t")],
        }))
        .unwrap();
        reg.resolve(&mut Diagnostics::new()).unwrap()
    }

    #[test]
    fn test_wide_members_shift_on_win32() {
        let reg = registry();
        let mut engine = LayoutEngine::new(&reg);
        let id = reg.lookup("VkMappedMemoryRange").unwrap();

        let win = engine.record_layout(id, Abi::Win32).unwrap();
        let host = engine.record_layout(id, Abi::Host).unwrap();

        assert_eq!(win.field("memory").unwrap().offset, 8);
        assert_eq!(host.field("memory").unwrap().offset, 8);
        assert_eq!(win.field("offset").unwrap().offset, 16);
        assert_eq!(host.field("offset").unwrap().offset, 16);
        assert_eq!(win.align, 8);
        assert_eq!(host.align, 4);
    }

    #[test]
    fn test_fixed_array_uses_constant_length() {
        let reg = registry();
        let mut engine = LayoutEngine::new(&reg);
        let layout = engine
            .record_layout(reg.lookup("VkUuid").unwrap(), Abi::Win32)
            .unwrap();
        assert_eq!(layout.field("uuid").unwrap().size, 16);
        assert_eq!(layout.size, 20);
    }

    #[test]
    fn test_union_is_max_of_members() {
        let reg = registry();
        let mut engine = LayoutEngine::new(&reg);
        let id = reg.lookup("VkValue").unwrap();
        let win = engine.record_layout(id, Abi::Win32).unwrap();
        let host = engine.record_layout(id, Abi::Host).unwrap();
        assert_eq!((win.size, win.align), (8, 8));
        assert_eq!((host.size, host.align), (8, 4));
        assert!(win.fields.iter().all(|f| f.offset == 0));
    }
}
