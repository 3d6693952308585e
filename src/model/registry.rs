//! The entity arena and its two-stage construction.

use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::logging::{debug, trace};

use super::entity::{
    Alias, Entity, EntityKind, Enum, Function, FunctionPointer, Handle, Member, Record,
};
use super::error::ModelError;
use super::{EntityId, Primitive, Resolved, Stage, TypeRef, Unresolved};

/// Arena of every registry entity with uniform lookup by name.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::model::{Registry, Entity, Constant};
/// use vk_thunkgen::Diagnostics;
///
/// let mut registry = Registry::new();
/// registry.insert(Entity::Constant(Constant {
///     name: "VK_UUID_SIZE".into(),
///     value: "16".into(),
/// }))?;
///
/// let mut diagnostics = Diagnostics::new();
/// let registry = registry.resolve(&mut diagnostics)?;
/// let id = registry.lookup("VK_UUID_SIZE")?;
/// ```
#[derive(Debug, Clone)]
pub struct Registry<S: Stage> {
    entities: Vec<Entity<S>>,
    by_name: HashMap<String, EntityId>,
    platform_types: BTreeSet<String>,
}

impl<S: Stage> Registry<S> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Look up an entity by name.
    pub fn lookup(&self, name: &str) -> Result<EntityId, ModelError> {
        self.find(name)
            .ok_or_else(|| ModelError::unknown(name, "registry lookup"))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity<S>> {
        self.entities.get(id.index())
    }

    pub fn name(&self, id: EntityId) -> &str {
        self.get(id).map(Entity::name).unwrap_or("<invalid>")
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity<S>)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId(i as u32), e))
    }

    /// Ids of every entity of `kind`, sorted by name.
    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(id, _)| id)
            .collect();
        ids.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        ids
    }

    pub fn is_platform_type(&self, name: &str) -> bool {
        self.platform_types.contains(name)
    }

    pub fn platform_types(&self) -> impl Iterator<Item = &str> {
        self.platform_types.iter().map(String::as_str)
    }

    pub fn alias(&self, id: EntityId) -> Option<&Alias<S>> {
        match self.get(id)? {
            Entity::Alias(a) => Some(a),
            _ => None,
        }
    }

    pub fn enumeration(&self, id: EntityId) -> Option<&Enum> {
        match self.get(id)? {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn handle(&self, id: EntityId) -> Option<&Handle<S>> {
        match self.get(id)? {
            Entity::Handle(h) => Some(h),
            _ => None,
        }
    }

    pub fn function_pointer(&self, id: EntityId) -> Option<&FunctionPointer<S>> {
        match self.get(id)? {
            Entity::FunctionPointer(fp) => Some(fp),
            _ => None,
        }
    }

    pub fn record(&self, id: EntityId) -> Option<&Record<S>> {
        match self.get(id)? {
            Entity::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn function(&self, id: EntityId) -> Option<&Function<S>> {
        match self.get(id)? {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Look up a function by name, failing on unknown names or other kinds.
    pub fn lookup_function(&self, name: &str) -> Result<EntityId, ModelError> {
        let id = self.lookup(name)?;
        match self.get(id).map(Entity::kind) {
            Some(EntityKind::Function) => Ok(id),
            Some(found) => Err(ModelError::KindMismatch {
                name: name.to_string(),
                expected: EntityKind::Function,
                found,
            }),
            None => Err(ModelError::unknown(name, "function lookup")),
        }
    }
}

impl Default for Registry<Unresolved> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<Unresolved> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            by_name: HashMap::new(),
            platform_types: BTreeSet::new(),
        }
    }

    /// Add an entity. Names are unique across every kind.
    pub fn insert(&mut self, entity: Entity<Unresolved>) -> Result<EntityId, ModelError> {
        let name = entity.name().to_string();
        if self.by_name.contains_key(&name) || self.platform_types.contains(&name) {
            return Err(ModelError::DuplicateEntity(name));
        }
        let id = EntityId(self.entities.len() as u32);
        trace!(name = %name, kind = %entity.kind(), "registering entity");
        self.entities.push(entity);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Declare an opaque platform type such as `HWND`.
    pub fn declare_platform_type(&mut self, name: impl Into<String>) -> Result<(), ModelError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ModelError::DuplicateEntity(name));
        }
        self.platform_types.insert(name);
        Ok(())
    }

    /// Mutable access to an enum before resolution (ingest appends values).
    pub fn enumeration_mut(&mut self, id: EntityId) -> Option<&mut Enum> {
        match self.entities.get_mut(id.index())? {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Back-fill every type name with a resolved reference.
    ///
    /// Unknown member, parameter, return and handle-parent types are fatal.
    /// A bitmask whose companion enum is missing is reported as
    /// [`Diagnostic::UnresolvedEnumLink`] and resolution continues. A
    /// declared-only companion stays linked; see
    /// [`Registry::report_undefined_companions`].
    pub fn resolve(self, diagnostics: &mut Diagnostics) -> Result<Registry<Resolved>, ModelError> {
        let Registry {
            entities,
            by_name,
            platform_types,
        } = self;

        let resolver = Resolver {
            entities: &entities,
            by_name: &by_name,
            platform_types: &platform_types,
        };

        let mut resolved = Vec::with_capacity(entities.len());
        for entity in &entities {
            resolved.push(resolver.entity(entity, diagnostics)?);
        }

        debug!(entities = resolved.len(), "registry resolved");
        Ok(Registry {
            entities: resolved,
            by_name,
            platform_types,
        })
    }
}

struct Resolver<'a> {
    entities: &'a [Entity<Unresolved>],
    by_name: &'a HashMap<String, EntityId>,
    platform_types: &'a BTreeSet<String>,
}

impl Resolver<'_> {
    fn ty(&self, name: &str, referenced_by: &str) -> Result<TypeRef, ModelError> {
        if let Some(prim) = Primitive::from_c_name(name) {
            return Ok(TypeRef::Primitive(prim));
        }
        if self.platform_types.contains(name) {
            return Ok(TypeRef::Primitive(Primitive::Platform));
        }
        self.by_name
            .get(name)
            .map(|id| TypeRef::Entity(*id))
            .ok_or_else(|| ModelError::unknown(name, referenced_by))
    }

    fn members(
        &self,
        members: &[Member<Unresolved>],
        owner: &str,
    ) -> Result<Vec<Member<Resolved>>, ModelError> {
        members
            .iter()
            .map(|m| {
                Ok(Member {
                    name: m.name.clone(),
                    type_name: m.type_name.clone(),
                    ty: self.ty(&m.type_name, owner)?,
                    pointer: m.pointer.clone(),
                    is_const: m.is_const,
                    array_len: m.array_len.clone(),
                    len: m.len.clone(),
                })
            })
            .collect()
    }

    fn entity(
        &self,
        entity: &Entity<Unresolved>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Entity<Resolved>, ModelError> {
        let resolved = match entity {
            Entity::Alias(a) => Entity::Alias(Alias {
                name: a.name.clone(),
                underlying: a.underlying.clone(),
                underlying_ty: self.ty(&a.underlying, &a.name)?,
                bitmask: a.bitmask,
                companion_name: a.companion_name.clone(),
                companion: self.companion(a, diagnostics),
            }),
            Entity::Constant(c) => Entity::Constant(c.clone()),
            Entity::Macro(m) => Entity::Macro(m.clone()),
            Entity::Enum(e) => Entity::Enum(e.clone()),
            Entity::Handle(h) => Entity::Handle(Handle {
                name: h.name.clone(),
                dispatchable: h.dispatchable,
                parent_name: h.parent_name.clone(),
                parent: self.parent(h)?,
            }),
            Entity::FunctionPointer(fp) => Entity::FunctionPointer(FunctionPointer {
                name: fp.name.clone(),
                return_type: fp.return_type.clone(),
                params: self.members(&fp.params, &fp.name)?,
            }),
            Entity::Record(r) => Entity::Record(Record {
                name: r.name.clone(),
                union: r.union,
                returned_only: r.returned_only,
                members: self.members(&r.members, &r.name)?,
            }),
            Entity::Function(f) => Entity::Function(Function {
                name: f.name.clone(),
                return_type: f.return_type.clone(),
                return_ty: self.ty(&f.return_type, &f.name)?,
                params: self.members(&f.params, &f.name)?,
                extension: f.extension.clone(),
            }),
        };
        Ok(resolved)
    }

    fn companion(&self, alias: &Alias<Unresolved>, diagnostics: &mut Diagnostics) -> Option<EntityId> {
        let name = alias.companion_name.as_ref()?;
        let id = self.by_name.get(name).copied();
        match id.and_then(|id| self.entities.get(id.index())) {
            // Declared-only enums may still be defined by an extension.
            Some(Entity::Enum(_)) => id,
            _ => {
                diagnostics.report(Diagnostic::UnresolvedEnumLink {
                    alias: alias.name.clone(),
                    companion: name.clone(),
                });
                None
            }
        }
    }

    fn parent(&self, handle: &Handle<Unresolved>) -> Result<Option<EntityId>, ModelError> {
        let Some(name) = handle.parent_name.as_ref() else {
            return Ok(None);
        };
        let id = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::unknown(name, &handle.name))?;
        match self.entities.get(id.index()) {
            Some(Entity::Handle(_)) => Ok(Some(id)),
            Some(other) => Err(ModelError::KindMismatch {
                name: name.clone(),
                expected: EntityKind::Handle,
                found: other.kind(),
            }),
            None => Err(ModelError::unknown(name, &handle.name)),
        }
    }
}

impl Registry<Resolved> {
    pub fn enumeration_mut(&mut self, id: EntityId) -> Option<&mut Enum> {
        match self.entities.get_mut(id.index())? {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, id: EntityId) -> Option<&mut Function<Resolved>> {
        match self.entities.get_mut(id.index())? {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Report bitmasks whose companion enum is still only declared. Run once
    /// extension values have been applied.
    pub fn report_undefined_companions(&self, diagnostics: &mut Diagnostics) {
        for (_, entity) in self.iter() {
            let Entity::Alias(alias) = entity else {
                continue;
            };
            let Some(companion) = alias.companion.and_then(|id| self.enumeration(id)) else {
                continue;
            };
            if !companion.defined {
                diagnostics.report(Diagnostic::UnresolvedEnumLink {
                    alias: alias.name.clone(),
                    companion: companion.name.clone(),
                });
            }
        }
    }

    /// Follow alias chains down to a primitive, if the type is scalar.
    pub fn primitive_of(&self, ty: TypeRef) -> Option<Primitive> {
        let mut current = ty;
        // Alias chains are short; the bound only guards against a malformed
        // self-referencing alias.
        for _ in 0..=self.entities.len() {
            match current {
                TypeRef::Primitive(p) => return Some(p),
                TypeRef::Entity(id) => match self.get(id)? {
                    Entity::Alias(a) => current = a.underlying_ty,
                    _ => return None,
                },
            }
        }
        None
    }

    /// The handle behind a type reference, if it is one.
    pub fn handle_of(&self, ty: TypeRef) -> Option<&Handle<Resolved>> {
        self.handle(ty.entity()?)
    }

    pub fn record_of(&self, ty: TypeRef) -> Option<&Record<Resolved>> {
        self.record(ty.entity()?)
    }

    pub fn is_dispatchable(&self, ty: TypeRef) -> bool {
        self.handle_of(ty).is_some_and(|h| h.dispatchable)
    }

    pub fn is_bitmask(&self, ty: TypeRef) -> bool {
        ty.entity()
            .and_then(|id| self.alias(id))
            .is_some_and(|a| a.bitmask)
    }

    pub fn is_enum(&self, ty: TypeRef) -> bool {
        ty.entity().and_then(|id| self.enumeration(id)).is_some()
    }

    /// Integer value of a constant used as an array length.
    pub fn constant_value(&self, name: &str) -> Option<u64> {
        let value = match self.get(self.find(name)?)? {
            Entity::Constant(c) => c.value.as_str(),
            _ => return None,
        };
        parse_c_integer(value)
    }
}

/// Parse a C integer literal such as `256`, `16U` or `0x10`.
pub(crate) fn parse_c_integer(text: &str) -> Option<u64> {
    let trimmed = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse().ok()
    }
}
