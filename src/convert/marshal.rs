//! Execution of conversion step lists over a simulated heap.
//!
//! The marshaller runs exactly the [`Step`]s the C renderer prints, against
//! the concrete [`RecordLayout`]s of both ABIs. Round-tripping a caller
//! record to host layout and back must reproduce every member, and
//! releasing the host copy must leave no live allocation behind.

use crate::abi::{Abi, Heap, HeapError, LayoutEngine, NULL, RecordLayout};
use crate::logging::{debug, info};
use crate::model::{EntityId, Registry, Resolved};

use super::{ConversionPlan, Count, Direction, MarshalError, Step};

/// Nesting depth past which verification stops allocating arrays.
const MAX_FILL_DEPTH: usize = 4;

/// Elements given to every array when filling a record for verification.
const FILL_ARRAY_LEN: u32 = 2;

pub struct Marshaller<'a> {
    registry: &'a Registry<Resolved>,
    plan: &'a ConversionPlan,
    layouts: LayoutEngine<'a>,
}

impl<'a> Marshaller<'a> {
    pub fn new(registry: &'a Registry<Resolved>, plan: &'a ConversionPlan) -> Self {
        Self {
            registry,
            plan,
            layouts: LayoutEngine::new(registry),
        }
    }

    pub fn layout(&mut self, record: EntityId, abi: Abi) -> Result<RecordLayout, MarshalError> {
        Ok(self.layouts.record_layout(record, abi)?)
    }

    fn steps(&self, record: EntityId, direction: Direction) -> Result<&'a [Step], MarshalError> {
        let plan: &'a ConversionPlan = self.plan;
        plan.conversion(record, direction)
            .map(|c| c.steps.as_slice())
            .ok_or_else(|| MarshalError::NotPlanned {
                record: self.registry.name(record).to_string(),
                direction,
            })
    }

    /// Allocate a zeroed record in the given layout.
    pub fn alloc_record(&mut self, heap: &mut Heap, record: EntityId, abi: Abi) -> Result<u32, MarshalError> {
        let layout = self.layout(record, abi)?;
        Ok(heap.alloc(layout.size, layout.align)?)
    }

    /// Convert one record from `src` into the already allocated `dst`.
    pub fn convert(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        direction: Direction,
        src: u32,
        dst: u32,
    ) -> Result<(), MarshalError> {
        self.run(
            heap,
            record,
            direction,
            direction.source_abi(),
            direction.target_abi(),
            src,
            dst,
        )
    }

    /// Convert `count` records into a fresh buffer. `NULL` in, `NULL` out.
    pub fn convert_array(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        direction: Direction,
        src: u32,
        count: u32,
    ) -> Result<u32, MarshalError> {
        self.run_array(
            heap,
            record,
            direction,
            direction.source_abi(),
            direction.target_abi(),
            src,
            count,
        )
    }

    /// Convert `count` records from `src` into the already allocated `dst`
    /// buffer, the way output arrays are copied back to the caller.
    pub fn convert_array_into(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        direction: Direction,
        src: u32,
        dst: u32,
        count: u32,
    ) -> Result<(), MarshalError> {
        if src == NULL || dst == NULL {
            return Ok(());
        }
        let src_size = self.layout(record, direction.source_abi())?.size;
        let dst_size = self.layout(record, direction.target_abi())?.size;
        for i in 0..count {
            self.convert(
                heap,
                record,
                direction,
                element(src, i, src_size)?,
                element(dst, i, dst_size)?,
            )?;
        }
        Ok(())
    }

    /// Release what the host copy of a single record points at.
    pub fn free_single(&mut self, heap: &mut Heap, record: EntityId, ptr: u32) -> Result<(), MarshalError> {
        self.release(heap, record, Abi::Host, ptr)
    }

    /// Release a host array and everything its elements point at.
    pub fn free_array(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        ptr: u32,
        count: u32,
    ) -> Result<(), MarshalError> {
        self.release_array(heap, record, Abi::Host, ptr, count)
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        direction: Direction,
        from: Abi,
        to: Abi,
        src: u32,
        dst: u32,
    ) -> Result<(), MarshalError> {
        let src_layout = self.layout(record, from)?;
        let dst_layout = self.layout(record, to)?;
        for step in self.steps(record, direction)? {
            let (s, d) = (
                field(self.registry, record, &src_layout, step.member())?,
                field(self.registry, record, &dst_layout, step.member())?,
            );
            match step {
                Step::Copy { .. } | Step::CopyFixedArray { .. } => {
                    heap.copy(at(src, s.0)?, at(dst, d.0)?, s.1.min(d.1))?;
                }
                Step::Convert { record: nested, .. } => {
                    self.run(heap, *nested, direction, from, to, at(src, s.0)?, at(dst, d.0)?)?;
                }
                Step::ConvertArray {
                    record: nested,
                    count,
                    ..
                } => {
                    let ptr = heap.read_u32(at(src, s.0)?)?;
                    let n = self.count(heap, record, &src_layout, src, count)?;
                    let converted = self.run_array(heap, *nested, direction, from, to, ptr, n)?;
                    heap.write_u32(at(dst, d.0)?, converted)?;
                }
                Step::Unsupported { member, .. } => {
                    return Err(MarshalError::Unsupported {
                        record: self.registry.name(record).to_string(),
                        member: member.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_array(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        direction: Direction,
        from: Abi,
        to: Abi,
        src: u32,
        count: u32,
    ) -> Result<u32, MarshalError> {
        if src == NULL {
            return Ok(NULL);
        }
        let src_size = self.layout(record, from)?.size;
        let dst_layout = self.layout(record, to)?;
        let dst = heap.alloc_array(dst_layout.size, count, dst_layout.align)?;
        for i in 0..count {
            self.run(
                heap,
                record,
                direction,
                from,
                to,
                element(src, i, src_size)?,
                element(dst, i, dst_layout.size)?,
            )?;
        }
        Ok(dst)
    }

    fn count(
        &self,
        heap: &Heap,
        record: EntityId,
        layout: &RecordLayout,
        base: u32,
        count: &Count,
    ) -> Result<u32, MarshalError> {
        match count {
            Count::One => Ok(1),
            Count::Member(name) => {
                let (offset, _) = field(self.registry, record, layout, name)?;
                Ok(heap.read_u32(at(base, offset)?)?)
            }
        }
    }

    /// Free the buffers a record in layout `abi` points at, following the
    /// caller-to-host step list that allocated them.
    pub fn release(&mut self, heap: &mut Heap, record: EntityId, abi: Abi, ptr: u32) -> Result<(), MarshalError> {
        if ptr == NULL {
            return Ok(());
        }
        let layout = self.layout(record, abi)?;
        for step in self.steps(record, Direction::WinToHost)? {
            match step {
                Step::Convert { record: nested, member } => {
                    let (offset, _) = field(self.registry, record, &layout, member)?;
                    self.release(heap, *nested, abi, at(ptr, offset)?)?;
                }
                Step::ConvertArray {
                    record: nested,
                    member,
                    count,
                } => {
                    let (offset, _) = field(self.registry, record, &layout, member)?;
                    let array = heap.read_u32(at(ptr, offset)?)?;
                    let n = self.count(heap, record, &layout, ptr, count)?;
                    self.release_array(heap, *nested, abi, array, n)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn release_array(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        abi: Abi,
        ptr: u32,
        count: u32,
    ) -> Result<(), MarshalError> {
        if ptr == NULL {
            return Ok(());
        }
        let size = self.layout(record, abi)?.size;
        for i in 0..count {
            self.release(heap, record, abi, element(ptr, i, size)?)?;
        }
        Ok(heap.free(ptr)?)
    }

    /// Fill a caller-layout record with bytes from `next`. Arrays the record
    /// converts get [`FILL_ARRAY_LEN`] elements (one for single pointers),
    /// filled recursively, with their count member set to match.
    pub fn fill(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        ptr: u32,
        next: &mut dyn FnMut() -> u8,
    ) -> Result<(), MarshalError> {
        self.fill_at(heap, record, ptr, next, 0)
    }

    fn fill_at(
        &mut self,
        heap: &mut Heap,
        record: EntityId,
        ptr: u32,
        next: &mut dyn FnMut() -> u8,
        depth: usize,
    ) -> Result<(), MarshalError> {
        let layout = self.layout(record, Abi::Win32)?;
        let steps = self.steps(record, Direction::WinToHost)?;
        for step in steps {
            if let Step::Copy { member } | Step::CopyFixedArray { member, .. } = step {
                let (offset, size) = field(self.registry, record, &layout, member)?;
                let bytes: Vec<u8> = (0..size).map(|_| next()).collect();
                heap.write(at(ptr, offset)?, &bytes)?;
            }
        }
        // Arrays last, so their counts overwrite the random bytes above.
        for step in steps {
            match step {
                Step::Convert { member, record: nested } => {
                    let (offset, _) = field(self.registry, record, &layout, member)?;
                    self.fill_at(heap, *nested, at(ptr, offset)?, next, depth + 1)?;
                }
                Step::ConvertArray {
                    member,
                    record: nested,
                    count,
                } => {
                    let (offset, _) = field(self.registry, record, &layout, member)?;
                    let n = match count {
                        _ if depth >= MAX_FILL_DEPTH => 0,
                        Count::One => 1,
                        Count::Member(_) => FILL_ARRAY_LEN,
                    };
                    if let Count::Member(name) = count {
                        let (count_offset, count_size) = field(self.registry, record, &layout, name)?;
                        let mut raw = vec![0u8; count_size as usize];
                        for (b, v) in raw.iter_mut().zip(n.to_le_bytes()) {
                            *b = v;
                        }
                        heap.write(at(ptr, count_offset)?, &raw)?;
                    }
                    let array = if n == 0 {
                        NULL
                    } else {
                        let elem = self.layout(*nested, Abi::Win32)?;
                        let array = heap.alloc_array(elem.size, n, elem.align)?;
                        for i in 0..n {
                            self.fill_at(heap, *nested, element(array, i, elem.size)?, next, depth + 1)?;
                        }
                        array
                    };
                    heap.write_u32(at(ptr, offset)?, array)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Members of two caller-layout records whose logical values differ.
    /// Converted arrays are compared element by element, not by address.
    pub fn compare(
        &mut self,
        heap: &Heap,
        record: EntityId,
        a: u32,
        b: u32,
    ) -> Result<Vec<String>, MarshalError> {
        let mut mismatches = Vec::new();
        self.compare_into(heap, record, a, b, &mut mismatches)?;
        Ok(mismatches)
    }

    fn compare_into(
        &mut self,
        heap: &Heap,
        record: EntityId,
        a: u32,
        b: u32,
        out: &mut Vec<String>,
    ) -> Result<(), MarshalError> {
        let layout = self.layout(record, Abi::Win32)?;
        let name = self.registry.name(record).to_string();
        for step in self.steps(record, Direction::WinToHost)? {
            let (offset, size) = field(self.registry, record, &layout, step.member())?;
            match step {
                Step::Copy { member } | Step::CopyFixedArray { member, .. } => {
                    if heap.read(at(a, offset)?, size)? != heap.read(at(b, offset)?, size)? {
                        out.push(format!("{name}.{member}"));
                    }
                }
                Step::Convert { record: nested, .. } => {
                    self.compare_into(heap, *nested, at(a, offset)?, at(b, offset)?, out)?;
                }
                Step::ConvertArray {
                    member,
                    record: nested,
                    count,
                } => {
                    let (pa, pb) = (heap.read_u32(at(a, offset)?)?, heap.read_u32(at(b, offset)?)?);
                    if (pa == NULL) != (pb == NULL) {
                        out.push(format!("{name}.{member}"));
                        continue;
                    }
                    let n = if pa == NULL {
                        0
                    } else {
                        self.count(heap, record, &layout, a, count)?
                    };
                    let elem = self.layout(*nested, Abi::Win32)?.size;
                    for i in 0..n {
                        self.compare_into(heap, *nested, element(pa, i, elem)?, element(pb, i, elem)?, out)?;
                    }
                }
                Step::Unsupported { .. } => {}
            }
        }
        Ok(())
    }

    /// Caller layout to host layout and back. Returns the caller-layout copy;
    /// the host copy is released before returning.
    pub fn round_trip(&mut self, heap: &mut Heap, record: EntityId, src: u32) -> Result<u32, MarshalError> {
        let host = self.alloc_record(heap, record, Abi::Host)?;
        self.run(heap, record, Direction::WinToHost, Abi::Win32, Abi::Host, src, host)?;
        let back = self.alloc_record(heap, record, Abi::Win32)?;
        self.run(heap, record, Direction::WinToHost, Abi::Host, Abi::Win32, host, back)?;
        self.free_single(heap, record, host)?;
        heap.free(host)?;
        Ok(back)
    }
}

/// Address `offset` bytes past `ptr`.
fn at(ptr: u32, offset: u32) -> Result<u32, HeapError> {
    ptr.checked_add(offset)
        .ok_or(HeapError::AddressOverflow { ptr, offset })
}

/// Address of element `index` in an array of `size`-byte elements.
fn element(base: u32, index: u32, size: u32) -> Result<u32, HeapError> {
    let offset = index
        .checked_mul(size)
        .ok_or(HeapError::ArrayTooLarge { size, count: index })?;
    at(base, offset)
}

/// Offset and size of a member in a layout.
fn field(
    registry: &Registry<Resolved>,
    record: EntityId,
    layout: &RecordLayout,
    member: &str,
) -> Result<(u32, u32), MarshalError> {
    layout
        .field(member)
        .map(|f| (f.offset, f.size))
        .ok_or_else(|| MarshalError::MissingField {
            record: registry.name(record).to_string(),
            member: member.to_string(),
        })
}

/// Outcome of [`verify_routines`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Records whose round trip was checked.
    pub checked: Vec<String>,
    /// Records skipped, with the reason.
    pub skipped: Vec<(String, String)>,
    /// `Record.member` paths that did not survive the round trip.
    pub mismatches: Vec<String>,
    /// Allocations left live after cleanup.
    pub leaked: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.leaked == 0
    }
}

/// Round-trip every planned caller-to-host record through the marshaller.
///
/// Output-only records and records with unsupported members are skipped.
pub fn verify_routines(
    registry: &Registry<Resolved>,
    plan: &ConversionPlan,
) -> Result<VerifyReport, MarshalError> {
    let mut report = VerifyReport::default();
    let mut marshaller = Marshaller::new(registry, plan);
    let mut seen = Vec::new();

    for key in plan.routines() {
        if seen.contains(&key.record) {
            continue;
        }
        seen.push(key.record);
        let name = registry.name(key.record).to_string();
        let to_host = plan
            .routines()
            .iter()
            .any(|k| k.record == key.record && k.direction == Direction::WinToHost);
        if !to_host {
            report.skipped.push((name, "output-only record".to_string()));
            continue;
        }
        let supported = plan
            .conversion(key.record, Direction::WinToHost)
            .is_some_and(|c| c.is_supported());
        if !supported {
            report.skipped.push((name, "unsupported member shape".to_string()));
            continue;
        }

        let mut heap = Heap::new();
        let mut counter = 0u8;
        let mut next = || {
            counter = counter.wrapping_add(37);
            counter
        };
        let src = marshaller.alloc_record(&mut heap, key.record, Abi::Win32)?;
        marshaller.fill(&mut heap, key.record, src, &mut next)?;
        let back = marshaller.round_trip(&mut heap, key.record, src)?;
        report
            .mismatches
            .extend(marshaller.compare(&heap, key.record, src, back)?);

        for ptr in [src, back] {
            marshaller.release(&mut heap, key.record, Abi::Win32, ptr)?;
            heap.free(ptr)?;
        }
        report.leaked += heap.live_allocations();
        debug!(record = %name, allocations = heap.total_allocations(), "round trip checked");
        report.checked.push(name);
    }

    info!(
        checked = report.checked.len(),
        skipped = report.skipped.len(),
        mismatches = report.mismatches.len(),
        "conversion routines verified"
    );
    Ok(report)
}
