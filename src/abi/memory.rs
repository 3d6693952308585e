//! Simulated 32-bit process heap.

use std::collections::BTreeMap;

use super::HeapError;
use super::buffer::{checked_align_to, read_slice, write_slice};

/// The null pointer.
pub const NULL: u32 = 0;

/// Highest address the heap hands out.
pub const HEAP_LIMIT: u32 = 1 << 28;

/// Bump-allocated heap with explicit frees.
///
/// Addresses are never reused, so a read through a freed pointer fails
/// instead of seeing a later allocation. Address 0 is never handed out.
///
/// # Example
///
/// ```ignore
/// use vk_thunkgen::abi::Heap;
///
/// let mut heap = Heap::new();
/// let ptr = heap.alloc(16, 8)?;
/// heap.write_u64(ptr, 42)?;
/// assert_eq!(heap.read_u64(ptr)?, 42);
/// heap.free(ptr)?;
/// assert_eq!(heap.live_allocations(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heap {
    blocks: BTreeMap<u32, Vec<u8>>,
    next: u32,
    total: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            next: 16,
            total: 0,
        }
    }

    /// Allocate `size` zeroed bytes aligned to `align`.
    pub fn alloc(&mut self, size: u32, align: u32) -> Result<u32, HeapError> {
        // Zero-sized requests still get a distinct address.
        let (ptr, end) = checked_align_to(self.next, align)
            .and_then(|ptr| Some((ptr, ptr.checked_add(size.max(1))?)))
            .filter(|&(_, end)| end <= HEAP_LIMIT)
            .ok_or(HeapError::Exhausted(size))?;
        self.blocks.insert(ptr, vec![0; size as usize]);
        self.next = end;
        self.total += 1;
        Ok(ptr)
    }

    /// Allocate `count` zeroed elements of `size` bytes each.
    pub fn alloc_array(&mut self, size: u32, count: u32, align: u32) -> Result<u32, HeapError> {
        let bytes = size
            .checked_mul(count)
            .ok_or(HeapError::ArrayTooLarge { size, count })?;
        self.alloc(bytes, align)
    }

    /// Release an allocation. Freeing [`NULL`] does nothing.
    pub fn free(&mut self, ptr: u32) -> Result<(), HeapError> {
        if ptr == NULL {
            return Ok(());
        }
        self.blocks
            .remove(&ptr)
            .map(|_| ())
            .ok_or(HeapError::InvalidFree(ptr))
    }

    fn block(&self, ptr: u32, len: u32) -> Result<(u32, &Vec<u8>), HeapError> {
        let (base, data) = self
            .blocks
            .range(..=ptr)
            .next_back()
            .ok_or(HeapError::OutOfBounds { ptr, len })?;
        if (ptr - base)
            .checked_add(len)
            .is_none_or(|end| end > data.len() as u32)
        {
            return Err(HeapError::OutOfBounds { ptr, len });
        }
        Ok((*base, data))
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], HeapError> {
        let (base, data) = self.block(ptr, len)?;
        read_slice(data, base, ptr, len)
    }

    pub fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), HeapError> {
        let (base, _) = self.block(ptr, bytes.len() as u32)?;
        let data = self
            .blocks
            .get_mut(&base)
            .ok_or(HeapError::OutOfBounds {
                ptr,
                len: bytes.len() as u32,
            })?;
        write_slice(data, base, ptr, bytes)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, HeapError> {
        let bytes = self.read(ptr, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), HeapError> {
        self.write(ptr, &value.to_le_bytes())
    }

    pub fn read_u64(&self, ptr: u32) -> Result<u64, HeapError> {
        let bytes = self.read(ptr, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn write_u64(&mut self, ptr: u32, value: u64) -> Result<(), HeapError> {
        self.write(ptr, &value.to_le_bytes())
    }

    /// Copy `len` bytes between (possibly different) allocations.
    pub fn copy(&mut self, src: u32, dst: u32, len: u32) -> Result<(), HeapError> {
        let bytes = self.read(src, len)?.to_vec();
        self.write(dst, &bytes)
    }

    /// Allocations not yet freed.
    pub fn live_allocations(&self) -> usize {
        self.blocks.len()
    }

    /// Allocations made over the heap's lifetime.
    pub fn total_allocations(&self) -> usize {
        self.total
    }
}
