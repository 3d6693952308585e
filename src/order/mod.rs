//! Dependency ordering of records for C emission.

mod error;

pub use error::OrderError;

use std::collections::HashSet;

use crate::logging::{debug, trace};
use crate::model::{EntityId, Registry, Resolved};
use crate::select::RequiredSet;

/// Order `candidates` so every record a member refers to comes first.
///
/// Candidates that are not required are dropped. Only dependencies on other
/// remaining candidates count, and a record pointing to itself is not a
/// dependency. A member reached through a pointer still counts, so two
/// records pointing at each other are reported as a cycle even though
/// neither contains the other. Each pass walks the remaining candidates in order and emits
/// every record whose dependencies are already emitted; the relative input
/// order of independent records is kept.
pub fn decouple(
    registry: &Registry<Resolved>,
    candidates: &[EntityId],
    required: &RequiredSet,
) -> Result<Vec<EntityId>, OrderError> {
    let mut remaining: Vec<EntityId> = candidates
        .iter()
        .copied()
        .filter(|id| required.contains(*id) && registry.record(*id).is_some())
        .collect();
    let members: HashSet<EntityId> = remaining.iter().copied().collect();
    let mut emitted: HashSet<EntityId> = HashSet::with_capacity(remaining.len());
    let mut ordered = Vec::with_capacity(remaining.len());

    let mut passes = 0;
    while !remaining.is_empty() {
        passes += 1;
        let before = ordered.len();
        let mut deferred = Vec::new();
        for id in remaining {
            let ready = registry.record(id).is_none_or(|r| {
                r.members.iter().filter_map(|m| m.entity()).all(|dep| {
                    dep == id || !members.contains(&dep) || emitted.contains(&dep)
                })
            });
            if ready {
                emitted.insert(id);
                ordered.push(id);
            } else {
                deferred.push(id);
            }
        }
        if ordered.len() == before {
            let names: Vec<String> = deferred
                .iter()
                .map(|id| registry.name(*id).to_string())
                .collect();
            trace!(remaining = names.len(), "no progress ordering records");
            return Err(OrderError::CyclicDependency { remaining: names });
        }
        remaining = deferred;
    }

    debug!(records = ordered.len(), passes = passes, "records ordered");
    Ok(ordered)
}
