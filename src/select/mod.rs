//! Selection of the API subset to generate.
//!
//! A function becomes *required* when the baseline feature set or an allowed
//! extension names it. Requiring a function pulls in, transitively, every
//! entity its signature mentions. The closure is a worklist over
//! [`EntityId`]s with a monotonic [`RequiredSet`] beside the arena.

use std::collections::BTreeSet;

use crate::logging::{debug, trace};
use crate::model::{Entity, EntityId, EntityKind, EnumValue, ModelError, Registry, Resolved};

/// First value of the range extension enums are numbered from.
pub const EXT_BASE: i64 = 1_000_000_000;
/// Values reserved per extension number.
pub const EXT_BLOCK_SIZE: i64 = 1_000;

/// `EXT_BASE + (number - 1) * EXT_BLOCK_SIZE + offset`, negated for values
/// counted downwards.
pub fn extension_enum_value(number: u32, offset: i64, negative: bool) -> i64 {
    let value = EXT_BASE + (i64::from(number) - 1) * EXT_BLOCK_SIZE + offset;
    if negative { -value } else { value }
}

/// Baseline API version: the commands every build exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub commands: Vec<String>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub number: u32,
    pub requires: Vec<String>,
    pub commands: Vec<String>,
    pub types: Vec<String>,
    pub enums: Vec<EnumAddition>,
}

/// A value an extension appends to an existing enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumAddition {
    pub name: String,
    pub extends: String,
    pub value: AdditionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionValue {
    /// Bit flag `1 << bitpos`, formatted as hex.
    BitPos(u32),
    /// Offset inside the extension's numbered block.
    Offset { offset: i64, negative: bool },
}

impl EnumAddition {
    /// Concrete value and hex formatting for an extension numbered `number`.
    pub fn resolve(&self, number: u32) -> Result<EnumValue, ModelError> {
        match self.value {
            AdditionValue::BitPos(bitpos) => {
                let value = 1i64
                    .checked_shl(bitpos)
                    .filter(|v| *v > 0)
                    .ok_or_else(|| ModelError::unknown(format!("bitpos {bitpos}"), &self.name))?;
                Ok(EnumValue::new(&self.name, value, true))
            }
            AdditionValue::Offset { offset, negative } => Ok(EnumValue::new(
                &self.name,
                extension_enum_value(number, offset, negative),
                false,
            )),
        }
    }
}

/// Which extensions take part in generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionPolicy {
    pub allow: BTreeSet<String>,
    pub deny: BTreeSet<String>,
}

impl ExtensionPolicy {
    /// Allowed, not denied, and not building on a denied extension.
    pub fn accepts(&self, extension: &Extension) -> bool {
        self.allow.contains(&extension.name)
            && !self.deny.contains(&extension.name)
            && !extension.requires.iter().any(|r| self.deny.contains(r))
    }
}

/// Monotonic required bit per entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSet {
    bits: Vec<bool>,
}

impl RequiredSet {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    /// Set the bit, returning `true` if it was not already set.
    pub fn mark(&mut self, id: EntityId) -> bool {
        let index = id.index();
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        match self.bits.get_mut(index) {
            Some(bit) if !*bit => {
                *bit = true;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.bits.get(id.index()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(|(i, _)| EntityId(i as u32))
    }
}

/// Drives selection over a resolved registry.
///
/// The selector borrows the registry mutably because extensions append enum
/// values and record the extension that owns each function they require.
pub struct Selector<'r> {
    registry: &'r mut Registry<Resolved>,
    required: RequiredSet,
}

impl<'r> Selector<'r> {
    pub fn new(registry: &'r mut Registry<Resolved>) -> Self {
        let required = RequiredSet::with_capacity(registry.len());
        Self { registry, required }
    }

    pub fn required(&self) -> &RequiredSet {
        &self.required
    }

    pub fn finish(self) -> RequiredSet {
        self.required
    }

    /// Require a function and everything its signature mentions.
    pub fn mark_required(&mut self, function_name: &str) -> Result<EntityId, ModelError> {
        let id = self.registry.lookup_function(function_name)?;
        self.close(id);
        Ok(id)
    }

    /// Require a type by name. Names that are not entities (includes,
    /// built-in scalars) are skipped.
    pub fn mark_type_required(&mut self, name: &str) -> Option<EntityId> {
        match self.registry.find(name) {
            Some(id) => {
                self.close(id);
                Some(id)
            }
            None => {
                trace!(name = %name, "skipping non-entity type");
                None
            }
        }
    }

    fn close(&mut self, start: EntityId) {
        let mut work = vec![start];
        while let Some(id) = work.pop() {
            if !self.required.mark(id) {
                continue;
            }
            trace!(entity = %self.registry.name(id), "required");
            match self.registry.get(id) {
                Some(Entity::Record(r)) => work.extend(r.members.iter().filter_map(|m| m.entity())),
                Some(Entity::FunctionPointer(fp)) => {
                    work.extend(fp.params.iter().filter_map(|p| p.entity()))
                }
                Some(Entity::Alias(a)) => {
                    work.extend(a.companion);
                    work.extend(a.underlying_ty.entity());
                }
                Some(Entity::Function(f)) => {
                    work.extend(f.return_entity());
                    work.extend(f.params.iter().filter_map(|p| p.entity()));
                }
                _ => {}
            }
        }
    }

    pub fn apply_feature_set(&mut self, features: &[Feature]) -> Result<(), ModelError> {
        for feature in features {
            debug!(feature = %feature.name, commands = feature.commands.len(), "including feature");
            for command in &feature.commands {
                self.mark_required(command)?;
            }
            for ty in &feature.types {
                self.mark_type_required(ty);
            }
        }
        Ok(())
    }

    /// Append every accepted extension's enum values to their target enums.
    ///
    /// Run before any closure walk so the emitted enums are complete. An
    /// addition to a declared-only enum defines that enum.
    pub fn apply_extension_enums(
        &mut self,
        extensions: &[Extension],
        policy: &ExtensionPolicy,
    ) -> Result<(), ModelError> {
        for ext in extensions.iter().filter(|e| policy.accepts(e)) {
            for addition in &ext.enums {
                let value = addition.resolve(ext.number)?;
                let target = self
                    .registry
                    .find(&addition.extends)
                    .ok_or_else(|| ModelError::unknown(&addition.extends, &ext.name))?;
                let found = self.registry.get(target).map(Entity::kind);
                let Some(e) = self.registry.enumeration_mut(target) else {
                    return Err(match found {
                        Some(found) => ModelError::KindMismatch {
                            name: addition.extends.clone(),
                            expected: EntityKind::Enum,
                            found,
                        },
                        None => ModelError::unknown(&addition.extends, &ext.name),
                    });
                };
                e.define();
                trace!(value = %value.name, target = %e.name, "extension enum value");
                e.add(value);
            }
        }
        Ok(())
    }

    /// Require every command (and listed type) of each accepted extension and
    /// record the owning extension on the function.
    pub fn apply_extension_commands(
        &mut self,
        extensions: &[Extension],
        policy: &ExtensionPolicy,
    ) -> Result<(), ModelError> {
        for ext in extensions {
            if !policy.accepts(ext) {
                trace!(extension = %ext.name, "skipping extension");
                continue;
            }
            debug!(extension = %ext.name, commands = ext.commands.len(), "including extension");
            for command in &ext.commands {
                let id = self.mark_required(command)?;
                if let Some(f) = self.registry.function_mut(id) {
                    f.extension = Some(ext.name.clone());
                }
            }
            for ty in &ext.types {
                self.mark_type_required(ty);
            }
        }
        Ok(())
    }

    /// Enum values first, then commands.
    pub fn apply_extensions(
        &mut self,
        extensions: &[Extension],
        policy: &ExtensionPolicy,
    ) -> Result<(), ModelError> {
        self.apply_extension_enums(extensions, policy)?;
        self.apply_extension_commands(extensions, policy)
    }
}
