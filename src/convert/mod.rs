//! Conversion routine synthesis.
//!
//! A conversion copies a record between the caller layout and the host
//! layout member by member. Routines are pure descriptions, a list of
//! [`Step`]s per (record, direction); the C renderer prints them and the
//! [`Marshaller`] executes them on a simulated heap.
//!
//! # Module Organization
//!
//! - [`marshal`]: executes step lists, round-trip verification
//! - [`error`]: error types for execution

mod error;
mod marshal;

pub use error::MarshalError;
pub use marshal::{Marshaller, VerifyReport, verify_routines};

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::abi::{Abi, AbiAnalysis};
use crate::diagnostics::{Diagnostic, Diagnostics, UnsupportedShape};
use crate::logging::{debug, trace};
use crate::model::{EntityId, Registry, Resolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Caller input handed to the driver.
    WinToHost,
    /// Driver output handed back to the caller.
    HostToWin,
}

impl Direction {
    /// Output-only records travel back to the caller; everything else goes
    /// to the driver.
    pub fn for_record(returned_only: bool) -> Self {
        if returned_only {
            Direction::HostToWin
        } else {
            Direction::WinToHost
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Direction::WinToHost => "win_to_host",
            Direction::HostToWin => "host_to_win",
        }
    }

    pub fn source_abi(self) -> Abi {
        match self {
            Direction::WinToHost => Abi::Win32,
            Direction::HostToWin => Abi::Host,
        }
    }

    pub fn target_abi(self) -> Abi {
        match self {
            Direction::WinToHost => Abi::Host,
            Direction::HostToWin => Abi::Win32,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Single,
    Array,
}

/// Identity of one generated conversion helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutineKey {
    pub record: EntityId,
    pub direction: Direction,
    pub shape: Shape,
}

/// Identity of one generated free helper. Free helpers always take the host
/// layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreeKey {
    pub record: EntityId,
    pub shape: Shape,
}

/// Element count of an array member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Count {
    /// Sibling member holding the count.
    Member(String),
    /// A single pointed-to record.
    One,
}

/// What a conversion does with one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Copy {
        member: String,
    },
    CopyFixedArray {
        member: String,
        len: String,
    },
    /// Nested record by value.
    Convert {
        member: String,
        record: EntityId,
    },
    /// Pointer to one or more records, converted into a fresh host buffer.
    ConvertArray {
        member: String,
        record: EntityId,
        count: Count,
    },
    Unsupported {
        member: String,
        shape: UnsupportedShape,
    },
}

impl Step {
    pub fn member(&self) -> &str {
        match self {
            Step::Copy { member }
            | Step::CopyFixedArray { member, .. }
            | Step::Convert { member, .. }
            | Step::ConvertArray { member, .. }
            | Step::Unsupported { member, .. } => member,
        }
    }
}

/// Step list of one record in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub record: EntityId,
    pub direction: Direction,
    pub steps: Vec<Step>,
}

impl Conversion {
    pub fn is_supported(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s, Step::Unsupported { .. }))
    }
}

/// Every helper the thunks need, in emission order (nested first).
#[derive(Debug, Clone, Default)]
pub struct ConversionPlan {
    conversions: HashMap<(EntityId, Direction), Conversion>,
    routines: Vec<RoutineKey>,
    frees: Vec<FreeKey>,
    owns_heap: HashMap<EntityId, bool>,
}

impl ConversionPlan {
    pub fn routines(&self) -> &[RoutineKey] {
        &self.routines
    }

    pub fn frees(&self) -> &[FreeKey] {
        &self.frees
    }

    pub fn conversion(&self, record: EntityId, direction: Direction) -> Option<&Conversion> {
        self.conversions.get(&(record, direction))
    }

    pub fn has_routine(&self, key: RoutineKey) -> bool {
        self.routines.contains(&key)
    }

    pub fn has_free(&self, key: FreeKey) -> bool {
        self.frees.contains(&key)
    }

    /// Whether the host copy of `record` made for the driver points at heap
    /// buffers that must be released after the call.
    pub fn owns_heap(&self, record: EntityId) -> bool {
        self.owns_heap.get(&record).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

/// Step list for one record, reporting shapes it cannot convert.
pub fn conversion_steps(
    registry: &Registry<Resolved>,
    analysis: &AbiAnalysis,
    record: EntityId,
    direction: Direction,
    diagnostics: &mut Diagnostics,
) -> Vec<Step> {
    let Some(r) = registry.record(record) else {
        return Vec::new();
    };
    let mut steps = Vec::with_capacity(r.members.len());
    for m in &r.members {
        let member = m.name.clone();
        let nested = m
            .entity()
            .filter(|_| analysis.member_needs_conversion(m));
        let step = match (nested, &m.array_len) {
            (Some(_), Some(_)) => Step::Unsupported {
                member,
                shape: UnsupportedShape::FixedArray,
            },
            (Some(_), None) if m.is_pointer() && direction == Direction::HostToWin => {
                Step::Unsupported {
                    member,
                    shape: UnsupportedShape::ReturnedArray,
                }
            }
            (Some(nested), None) if m.is_pointer() => Step::ConvertArray {
                member,
                record: nested,
                count: match &m.len {
                    Some(len) => Count::Member(len.clone()),
                    None => Count::One,
                },
            },
            (Some(nested), None) => Step::Convert {
                member,
                record: nested,
            },
            (None, Some(len)) => Step::CopyFixedArray {
                member,
                len: len.clone(),
            },
            (None, None) => Step::Copy { member },
        };
        if let Step::Unsupported { member, shape } = &step {
            diagnostics.report(Diagnostic::UnsupportedConversionShape {
                record: r.name.clone(),
                member: member.clone(),
                shape: *shape,
            });
        }
        steps.push(step);
    }
    steps
}

/// Builds a [`ConversionPlan`] from the functions that need conversion.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::convert::Synthesizer;
///
/// let mut synth = Synthesizer::new(&registry, &analysis);
/// let (plan, diagnostics) = synth.plan(&host_order, &functions);
/// for key in plan.routines() {
///     println!("{}", registry.name(key.record));
/// }
/// ```
pub struct Synthesizer<'a> {
    registry: &'a Registry<Resolved>,
    analysis: &'a AbiAnalysis,
    plan: ConversionPlan,
    diagnostics: Diagnostics,
    visiting: HashSet<(EntityId, Direction)>,
    freeing: HashSet<FreeKey>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(registry: &'a Registry<Resolved>, analysis: &'a AbiAnalysis) -> Self {
        Self {
            registry,
            analysis,
            plan: ConversionPlan::default(),
            diagnostics: Diagnostics::new(),
            visiting: HashSet::new(),
            freeing: HashSet::new(),
        }
    }

    /// Plan every helper the given functions need.
    ///
    /// Top-level requirements are taken in `host_order` (the dependency order
    /// of records needing conversion); nested helpers are always planned
    /// before the helper that calls them.
    pub fn plan(
        mut self,
        host_order: &[EntityId],
        functions: &[EntityId],
    ) -> (ConversionPlan, Diagnostics) {
        let mut wanted: Vec<(usize, RoutineKey)> = Vec::new();
        for f in functions.iter().filter_map(|id| self.registry.function(*id)) {
            for p in &f.params {
                let Some(record) = p.entity().filter(|_| self.analysis.member_needs_conversion(p))
                else {
                    continue;
                };
                let returned_only = self
                    .registry
                    .record(record)
                    .is_some_and(|r| r.returned_only);
                let key = RoutineKey {
                    record,
                    direction: Direction::for_record(returned_only),
                    shape: if p.is_dynamic_array() {
                        Shape::Array
                    } else {
                        Shape::Single
                    },
                };
                let rank = host_order
                    .iter()
                    .position(|id| *id == record)
                    .unwrap_or(host_order.len());
                if !wanted.iter().any(|(_, k)| *k == key) {
                    wanted.push((rank, key));
                }
            }
        }
        wanted.sort_by_key(|(rank, _)| *rank);

        for (_, key) in wanted {
            self.require(key);
            match (key.direction, key.shape) {
                (Direction::WinToHost, Shape::Array) => self.require_free(key.record, Shape::Array),
                (Direction::WinToHost, Shape::Single) => {
                    if self.owns_heap(key.record) {
                        self.require_free(key.record, Shape::Single);
                    }
                }
                // Output buffers hold driver pointers; the thunk releases only
                // the outer host buffer.
                (Direction::HostToWin, _) => {}
            }
        }
        let inputs: Vec<EntityId> = self
            .plan
            .routines
            .iter()
            .filter(|k| k.direction == Direction::WinToHost)
            .map(|k| k.record)
            .collect();
        for record in inputs {
            self.owns_heap(record);
        }

        debug!(
            routines = self.plan.routines.len(),
            frees = self.plan.frees.len(),
            "conversion plan built"
        );
        (self.plan, self.diagnostics)
    }

    /// The memoized step list for (record, direction).
    pub fn conversion(&mut self, record: EntityId, direction: Direction) -> &Conversion {
        let registry = self.registry;
        let analysis = self.analysis;
        let diagnostics = &mut self.diagnostics;
        self.plan
            .conversions
            .entry((record, direction))
            .or_insert_with(|| Conversion {
                record,
                direction,
                steps: conversion_steps(registry, analysis, record, direction, diagnostics),
            })
    }

    /// Plan a helper and, first, every helper its steps call.
    pub fn require(&mut self, key: RoutineKey) {
        if self.plan.routines.contains(&key) || !self.visiting.insert((key.record, key.direction)) {
            return;
        }
        let nested: Vec<RoutineKey> = self
            .conversion(key.record, key.direction)
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Convert { record, .. } => Some(RoutineKey {
                    record: *record,
                    direction: key.direction,
                    shape: Shape::Single,
                }),
                Step::ConvertArray { record, .. } => Some(RoutineKey {
                    record: *record,
                    direction: key.direction,
                    shape: Shape::Array,
                }),
                _ => None,
            })
            .collect();
        for n in nested {
            self.require(n);
        }
        self.visiting.remove(&(key.record, key.direction));
        if !self.plan.routines.contains(&key) {
            trace!(record = %self.registry.name(key.record), direction = %key.direction, "planned conversion");
            self.plan.routines.push(key);
        }
    }

    /// Whether the host copy of `record` owns heap buffers.
    pub fn owns_heap(&mut self, record: EntityId) -> bool {
        if let Some(owns) = self.plan.owns_heap.get(&record) {
            return *owns;
        }
        // Provisional answer for pointer cycles.
        self.plan.owns_heap.insert(record, false);
        let steps = self.conversion(record, Direction::WinToHost).steps.clone();
        let mut owns = false;
        for step in &steps {
            owns |= match step {
                Step::ConvertArray { .. } => true,
                Step::Convert { record, .. } => self.owns_heap(*record),
                _ => false,
            };
        }
        self.plan.owns_heap.insert(record, owns);
        owns
    }

    fn require_free(&mut self, record: EntityId, shape: Shape) {
        let key = FreeKey { record, shape };
        if self.plan.frees.contains(&key) || !self.freeing.insert(key) {
            return;
        }
        let steps = self.conversion(record, Direction::WinToHost).steps.clone();
        for step in &steps {
            match step {
                Step::ConvertArray { record, .. } => self.require_free(*record, Shape::Array),
                Step::Convert { record, .. } if self.owns_heap(*record) => {
                    self.require_free(*record, Shape::Single)
                }
                _ => {}
            }
        }
        self.freeing.remove(&key);
        if !self.plan.frees.contains(&key) {
            self.plan.frees.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alias, Entity, Function, Member, Record, Unresolved};

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

    fn array(name: &str, ty: &str, len: &str) -> Member<Unresolved> {
        Member {
            pointer: Some("*".to_string()),
            len: Some(len.to_string()),
            is_const: true,
            ..member(name, ty)
        }
    }

    fn record(name: &str, returned_only: bool, members: Vec<Member<Unresolved>>) -> Entity<Unresolved> {
        Entity::Record(Record {
            name: name.to_string(),
            union: false,
            returned_only,
            members,
        })
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
        reg.insert(record(
            "VkSparseMemoryBind",
            false,
            vec![member("resourceOffset", "VkDeviceSize"), member("flags", "uint32_t")],
        ))
        .unwrap();
        reg.insert(record(
            "VkSparseBufferMemoryBindInfo",
            false,
            vec![
                member("bindCount", "uint32_t"),
                array("pBinds", "VkSparseMemoryBind", "bindCount"),
            ],
        ))
        .unwrap();
        reg.insert(record(
            "VkBindSparseInfo",
            false,
            vec![
                member("bufferBindCount", "uint32_t"),
                array("pBufferBinds", "VkSparseBufferMemoryBindInfo", "bufferBindCount"),
            ],
        ))
        .unwrap();
        let mut heaps = member("memoryHeaps", "VkSparseMemoryBind");
        heaps.array_len = Some("2".to_string());
        reg.insert(record(
            "VkReturned",
            true,
            vec![
                member("size", "VkDeviceSize"),
                array("pBinds", "VkSparseMemoryBind", "bindCount"),
                heaps,
            ],
        ))
        .unwrap();
        reg.insert(Entity::Function(Function {
            name: "vkQueueBindSparse".to_string(),
            return_type: "void".to_string(),
            return_ty: (),
            params: vec![
                member("bindInfoCount", "uint32_t"),
                array("pBindInfo", "VkBindSparseInfo", "bindInfoCount"),
            ],
            extension: None,
        }))
        .unwrap();
        reg.insert(Entity::Function(Function {
            name: "vkGetReturned".to_string(),
            return_type: "void".to_string(),
            return_ty: (),
            params: vec![Member {
                pointer: Some("*".to_string()),
                ..member("pOut", "VkReturned")
            }],
            extension: None,
        }))
        .unwrap();
        reg.resolve(&mut Diagnostics::new()).unwrap()
    }

    #[test]
    fn test_nested_routines_planned_first() {
        let reg = registry();
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let f = reg.lookup("vkQueueBindSparse").unwrap();
        let (plan, diags) = Synthesizer::new(&reg, &analysis).plan(&[], &[f]);
        assert!(diags.is_empty());

        let names: Vec<&str> = plan.routines().iter().map(|k| reg.name(k.record)).collect();
        assert_eq!(
            names,
            vec!["VkSparseMemoryBind", "VkSparseBufferMemoryBindInfo", "VkBindSparseInfo"]
        );
        assert!(plan
            .routines()
            .iter()
            .all(|k| k.shape == Shape::Array && k.direction == Direction::WinToHost));

        let bind_info = reg.lookup("VkBindSparseInfo").unwrap();
        assert!(plan.owns_heap(bind_info));
        assert!(!plan.owns_heap(reg.lookup("VkSparseMemoryBind").unwrap()));
        let frees: Vec<&str> = plan.frees().iter().map(|k| reg.name(k.record)).collect();
        assert_eq!(frees, names);
    }

    #[test]
    fn test_member_steps() {
        let reg = registry();
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let mut diags = Diagnostics::new();
        let steps = conversion_steps(
            &reg,
            &analysis,
            reg.lookup("VkSparseBufferMemoryBindInfo").unwrap(),
            Direction::WinToHost,
            &mut diags,
        );
        assert_eq!(
            steps,
            vec![
                Step::Copy {
                    member: "bindCount".to_string()
                },
                Step::ConvertArray {
                    member: "pBinds".to_string(),
                    record: reg.lookup("VkSparseMemoryBind").unwrap(),
                    count: Count::Member("bindCount".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_unsupported_shapes_reported_once() {
        let reg = registry();
        let analysis = AbiAnalysis::new(&reg).unwrap();
        let f = reg.lookup("vkGetReturned").unwrap();
        let (plan, diags) = Synthesizer::new(&reg, &analysis).plan(&[], &[f]);

        let returned = reg.lookup("VkReturned").unwrap();
        let key = RoutineKey {
            record: returned,
            direction: Direction::HostToWin,
            shape: Shape::Single,
        };
        assert!(plan.has_routine(key));
        assert!(!plan.conversion(returned, Direction::HostToWin).unwrap().is_supported());
        assert_eq!(diags.len(), 2);
        let shapes: Vec<UnsupportedShape> = diags
            .iter()
            .filter_map(|d| match d {
                Diagnostic::UnsupportedConversionShape { shape, .. } => Some(*shape),
                _ => None,
            })
            .collect();
        assert_eq!(
            shapes,
            vec![UnsupportedShape::ReturnedArray, UnsupportedShape::FixedArray]
        );
    }
}
