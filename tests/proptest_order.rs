//! Property-based tests for record ordering.
//!
//! Random acyclic record graphs are inserted in a shuffled order; the
//! emission order must list every record once and after everything it
//! refers to.

use proptest::prelude::*;
use proptest::sample::Index;

use vk_thunkgen::model::{Entity, EntityId, Member, Record};
use vk_thunkgen::order::decouple;
use vk_thunkgen::select::RequiredSet;
use vk_thunkgen::{Diagnostics, Registry, Resolved, Unresolved};

/// Record `k` depends only on records `0..k`, which keeps the graph acyclic.
fn record_graph() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..12)
        .prop_flat_map(|n| {
            let deps = prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), n);
            let insertion = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (deps, insertion)
        })
        .prop_map(|(deps, insertion)| {
            let deps = deps
                .iter()
                .enumerate()
                .map(|(k, picks)| {
                    if k == 0 {
                        Vec::new()
                    } else {
                        picks.iter().map(|i| i.index(k)).collect()
                    }
                })
                .collect();
            (deps, insertion)
        })
}

fn member(name: String, ty: String, pointer: bool) -> Member<Unresolved> {
    Member {
        name,
        type_name: ty,
        ty: (),
        pointer: pointer.then(|| "*".to_string()),
        is_const: false,
        array_len: None,
        len: None,
    }
}

fn record_name(k: usize) -> String {
    format!("VkRecord{k}")
}

fn build(deps: &[Vec<usize>], insertion: &[usize]) -> (Registry<Resolved>, Vec<EntityId>) {
    let mut registry = Registry::new();
    for &k in insertion {
        let mut members: Vec<Member<Unresolved>> = deps[k]
            .iter()
            .enumerate()
            .map(|(i, &dep)| member(format!("m{i}"), record_name(dep), i % 2 == 1))
            .collect();
        // Self references never delay a record.
        members.push(member("pSelf".to_string(), record_name(k), true));
        registry
            .insert(Entity::Record(Record {
                name: record_name(k),
                union: false,
                returned_only: false,
                members,
            }))
            .unwrap();
    }
    let registry = registry.resolve(&mut Diagnostics::new()).unwrap();
    let ids = insertion
        .iter()
        .map(|&k| registry.lookup(&record_name(k)).unwrap())
        .collect();
    (registry, ids)
}

fn all_required(ids: &[EntityId]) -> RequiredSet {
    let mut required = RequiredSet::with_capacity(ids.len());
    for id in ids {
        required.mark(*id);
    }
    required
}

proptest! {
    #[test]
    fn order_is_a_topological_permutation((deps, insertion) in record_graph()) {
        let (registry, ids) = build(&deps, &insertion);
        let ordered = decouple(&registry, &ids, &all_required(&ids)).unwrap();

        prop_assert_eq!(ordered.len(), ids.len());
        let position = |name: &str| ordered.iter().position(|id| registry.name(*id) == name);
        for (k, record_deps) in deps.iter().enumerate() {
            let at = position(&record_name(k)).unwrap();
            for dep in record_deps {
                let dep_at = position(&record_name(*dep)).unwrap();
                prop_assert!(dep_at < at, "{} emitted before {}", record_name(k), record_name(*dep));
            }
        }
    }

    #[test]
    fn independent_records_keep_input_order((deps, insertion) in record_graph()) {
        let (registry, ids) = build(&deps, &insertion);
        let ordered = decouple(&registry, &ids, &all_required(&ids)).unwrap();

        let independent = |id: &&EntityId| {
            let name = registry.name(**id);
            deps.iter()
                .enumerate()
                .any(|(k, d)| d.is_empty() && record_name(k) == name)
        };
        let expected: Vec<&EntityId> = ids.iter().filter(independent).collect();
        let actual: Vec<&EntityId> = ordered.iter().filter(independent).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn unrequired_records_are_dropped((deps, insertion) in record_graph()) {
        let (registry, ids) = build(&deps, &insertion);
        let required = all_required(&ids[..1]);
        let ordered = decouple(&registry, &ids, &required).unwrap();
        prop_assert_eq!(ordered, vec![ids[0]]);
    }
}

fn insert_pair(pointer: bool) -> (Registry<Resolved>, Vec<EntityId>) {
    let mut registry = Registry::new();
    for (name, other) in [("VkA", "VkB"), ("VkB", "VkA")] {
        registry
            .insert(Entity::Record(Record {
                name: name.to_string(),
                union: false,
                returned_only: false,
                members: vec![member(other.to_ascii_lowercase(), other.to_string(), pointer)],
            }))
            .unwrap();
    }
    let registry = registry.resolve(&mut Diagnostics::new()).unwrap();
    let ids = ["VkA", "VkB"]
        .iter()
        .map(|n| registry.lookup(n).unwrap())
        .collect();
    (registry, ids)
}

#[test]
fn mutual_pointer_dependency_is_reported() {
    let (registry, ids) = insert_pair(true);
    let err = decouple(&registry, &ids, &all_required(&ids)).unwrap_err();
    assert_eq!(
        err,
        vk_thunkgen::order::OrderError::CyclicDependency {
            remaining: vec!["VkA".to_string(), "VkB".to_string()]
        }
    );
}

#[test]
fn mutual_by_value_dependency_is_reported() {
    let (registry, ids) = insert_pair(false);
    let err = decouple(&registry, &ids, &all_required(&ids)).unwrap_err();
    assert!(matches!(
        err,
        vk_thunkgen::order::OrderError::CyclicDependency { ref remaining }
            if remaining == &["VkA".to_string(), "VkB".to_string()]
    ));
}
