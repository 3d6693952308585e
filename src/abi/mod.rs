//! ABI divergence between the Win32 caller and the host driver.
//!
//! Both sides are 32-bit, so almost every type has the same layout. The
//! exception is 8-byte scalars, which Win32 aligns to 8 inside structs and
//! the host aligns to 4. A record containing one (directly or through a
//! nested record) *needs alignment*; a record that needs alignment, or that
//! reaches such a record through any member, *needs conversion* before it
//! can be handed to the driver.
//!
//! # Module Organization
//!
//! - [`error`]: error types for analysis, layout and the heap
//! - [`layout`]: concrete per-ABI struct layouts
//! - [`memory`]: simulated 32-bit heap the marshaller runs on
//! - [`buffer`]: bounds-checked byte helpers

mod buffer;
mod error;
mod layout;
mod memory;

pub use buffer::align_to;
pub use error::{AbiError, HeapError, LayoutError};
pub use layout::{Abi, FieldLayout, LayoutEngine, RecordLayout, primitive_layout};
pub use memory::{HEAP_LIMIT, Heap, NULL};

use std::collections::HashMap;

use crate::logging::debug;
use crate::model::{EntityId, EntityKind, Function, Member, Registry, Resolved};

/// Records whose layouts happen to match across ABIs even though they
/// contain 64-bit members.
pub const CONVERSION_EXCLUSIONS: &[&str] = &["VkSparseImageMemoryRequirements"];

/// Divergence flags of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordAbi {
    pub needs_alignment: bool,
    pub needs_conversion: bool,
}

enum Visit {
    InProgress,
    Done(RecordAbi),
}

/// Divergence flags for every record of a resolved registry.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::abi::AbiAnalysis;
///
/// let analysis = AbiAnalysis::new(&registry)?;
/// let id = registry.lookup("VkMappedMemoryRange")?;
/// assert!(analysis.record_needs_conversion(id));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbiAnalysis {
    records: HashMap<EntityId, RecordAbi>,
}

impl AbiAnalysis {
    /// Classify every record once, depth first.
    ///
    /// A record that contains itself by value is [`AbiError::CyclicDependency`];
    /// a record reaching itself through a pointer is not a cycle.
    pub fn new(registry: &Registry<Resolved>) -> Result<Self, AbiError> {
        let mut visits = HashMap::new();
        for id in registry.ids_of(EntityKind::Record) {
            visit(registry, id, false, &mut visits)?;
        }
        let records: HashMap<EntityId, RecordAbi> = visits
            .into_iter()
            .filter_map(|(id, v)| match v {
                Visit::Done(abi) => Some((id, abi)),
                Visit::InProgress => None,
            })
            .collect();
        debug!(
            records = records.len(),
            diverging = records.values().filter(|r| r.needs_conversion).count(),
            "ABI analysis done"
        );
        Ok(Self { records })
    }

    pub fn record(&self, id: EntityId) -> RecordAbi {
        self.records.get(&id).copied().unwrap_or_default()
    }

    pub fn record_needs_alignment(&self, id: EntityId) -> bool {
        self.record(id).needs_alignment
    }

    pub fn record_needs_conversion(&self, id: EntityId) -> bool {
        self.record(id).needs_conversion
    }

    /// Whether the member itself is placed differently on the two ABIs.
    pub fn member_needs_alignment(&self, registry: &Registry<Resolved>, m: &Member<Resolved>) -> bool {
        if m.is_pointer() {
            return false;
        }
        scalar_needs_alignment(registry, m)
            || m.entity().is_some_and(|id| self.record_needs_alignment(id))
    }

    /// Whether the member's record type, reached directly or through a
    /// pointer, needs conversion.
    pub fn member_needs_conversion(&self, m: &Member<Resolved>) -> bool {
        m.entity().is_some_and(|id| self.record_needs_conversion(id))
    }

    pub fn function_needs_conversion(&self, f: &Function<Resolved>) -> bool {
        f.params.iter().any(|p| self.member_needs_conversion(p))
    }
}

/// 8-byte integers (aliases included) and non-dispatchable handles.
fn scalar_needs_alignment(registry: &Registry<Resolved>, m: &Member<Resolved>) -> bool {
    if let Some(p) = registry.primitive_of(m.ty) {
        return p.is_wide_integer();
    }
    registry.handle_of(m.ty).is_some_and(|h| !h.dispatchable)
}

fn visit(
    registry: &Registry<Resolved>,
    id: EntityId,
    via_pointer: bool,
    visits: &mut HashMap<EntityId, Visit>,
) -> Result<RecordAbi, AbiError> {
    match visits.get(&id) {
        Some(Visit::Done(abi)) => return Ok(*abi),
        Some(Visit::InProgress) if via_pointer => return Ok(RecordAbi::default()),
        Some(Visit::InProgress) => {
            return Err(AbiError::CyclicDependency {
                record: registry.name(id).to_string(),
            });
        }
        None => {}
    }
    let record = registry
        .record(id)
        .ok_or_else(|| AbiError::NotARecord(registry.name(id).to_string()))?;
    visits.insert(id, Visit::InProgress);

    let mut abi = RecordAbi::default();
    let mut nested_conversion = false;
    for m in &record.members {
        if !m.is_pointer() && scalar_needs_alignment(registry, m) {
            abi.needs_alignment = true;
        }
        let Some(child) = m.entity().filter(|c| registry.record(*c).is_some()) else {
            continue;
        };
        let nested = visit(registry, child, m.is_pointer(), visits)?;
        if !m.is_pointer() && nested.needs_alignment {
            abi.needs_alignment = true;
        }
        nested_conversion |= nested.needs_conversion;
    }
    let excluded = CONVERSION_EXCLUSIONS.contains(&record.name.as_str());
    abi.needs_conversion = !excluded && (abi.needs_alignment || nested_conversion);

    visits.insert(id, Visit::Done(abi));
    Ok(abi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::model::{Alias, Entity, Handle, Record, Unresolved};

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

    fn pointer(name: &str, ty: &str) -> Member<Unresolved> {
        Member {
            pointer: Some("*".to_string()),
            ..member(name, ty)
        }
    }

    fn record(name: &str, members: Vec<Member<Unresolved>>) -> Entity<Unresolved> {
        Entity::Record(Record {
            name: name.to_string(),
            union: false,
            returned_only: false,
            members,
        })
    }

    fn registry(records: Vec<Entity<Unresolved>>) -> Registry<Resolved> {
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
        reg.insert(Entity::Handle(Handle {
            name: "VkDevice".to_string(),
            dispatchable: true,
            parent_name: None,
            parent: (),
        }))
        .unwrap();
        for r in records {
            reg.insert(r).unwrap();
        }
        reg.resolve(&mut Diagnostics::new()).unwrap()
    }

    fn flags(reg: &Registry<Resolved>, analysis: &AbiAnalysis, name: &str) -> RecordAbi {
        analysis.record(reg.lookup(name).unwrap())
    }

    #[test]
    fn test_wide_scalars_and_handles_need_alignment() {
        let reg = registry(vec![
            record("VkA", vec![member("size", "VkDeviceSize")]),
            record("VkB", vec![member("buffer", "VkBuffer")]),
            record("VkC", vec![member("device", "VkDevice"), member("n", "size_t")]),
            record("VkD", vec![pointer("pSize", "VkDeviceSize")]),
        ]);
        let analysis = AbiAnalysis::new(&reg).unwrap();
        assert!(flags(&reg, &analysis, "VkA").needs_conversion);
        assert!(flags(&reg, &analysis, "VkB").needs_alignment);
        assert_eq!(flags(&reg, &analysis, "VkC"), RecordAbi::default());
        assert_eq!(flags(&reg, &analysis, "VkD"), RecordAbi::default());
    }

    #[test]
    fn test_nesting_propagates() {
        let reg = registry(vec![
            record("VkLeaf", vec![member("size", "VkDeviceSize")]),
            record("VkByValue", vec![member("leaf", "VkLeaf")]),
            record("VkByPointer", vec![member("count", "uint32_t"), pointer("pLeaves", "VkLeaf")]),
        ]);
        let analysis = AbiAnalysis::new(&reg).unwrap();

        let by_value = flags(&reg, &analysis, "VkByValue");
        assert!(by_value.needs_alignment && by_value.needs_conversion);

        let by_pointer = flags(&reg, &analysis, "VkByPointer");
        assert!(!by_pointer.needs_alignment);
        assert!(by_pointer.needs_conversion);
    }

    #[test]
    fn test_hard_exclusion() {
        let reg = registry(vec![record(
            "VkSparseImageMemoryRequirements",
            vec![member("imageMipTailSize", "VkDeviceSize")],
        )]);
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let f = flags(&reg, &analysis, "VkSparseImageMemoryRequirements");
        assert!(f.needs_alignment);
        assert!(!f.needs_conversion);
    }

    #[test]
    fn test_containment_cycle_is_fatal() {
        let reg = registry(vec![
            record("VkLoopA", vec![member("b", "VkLoopB")]),
            record("VkLoopB", vec![member("a", "VkLoopA")]),
        ]);
        assert!(matches!(
            AbiAnalysis::new(&reg),
            Err(AbiError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_pointer_cycle_is_not_a_cycle() {
        let reg = registry(vec![record(
            "VkChain",
            vec![pointer("pNextLink", "VkChain"), member("size", "VkDeviceSize")],
        )]);
        let analysis = AbiAnalysis::new(&reg).unwrap();
        assert!(flags(&reg, &analysis, "VkChain").needs_conversion);
    }
}
