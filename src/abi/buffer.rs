//! Little-endian scalar access over byte buffers.

use super::HeapError;

/// Round `val` up to a multiple of `align` (a power of two).
#[inline]
pub fn align_to(val: u32, align: u32) -> u32 {
    let align = align.max(1);
    (val + align - 1) & !(align - 1)
}

/// [`align_to`] that reports overflow instead of wrapping.
#[inline]
pub fn checked_align_to(val: u32, align: u32) -> Option<u32> {
    let align = align.max(1);
    Some(val.checked_add(align - 1)? & !(align - 1))
}

#[inline]
pub(crate) fn read_slice(buffer: &[u8], base: u32, start: u32, len: u32) -> Result<&[u8], HeapError> {
    let from = (start - base) as usize;
    buffer
        .get(from..from + len as usize)
        .ok_or(HeapError::OutOfBounds { ptr: start, len })
}

#[inline]
pub(crate) fn write_slice(
    buffer: &mut [u8],
    base: u32,
    start: u32,
    data: &[u8],
) -> Result<(), HeapError> {
    let from = (start - base) as usize;
    buffer
        .get_mut(from..from + data.len())
        .ok_or(HeapError::OutOfBounds {
            ptr: start,
            len: data.len() as u32,
        })?
        .copy_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(4, 8), 8);
        assert_eq!(align_to(12, 4), 12);
        assert_eq!(align_to(5, 1), 5);
        assert_eq!(checked_align_to(12, 8), Some(16));
        assert_eq!(checked_align_to(u32::MAX - 2, 8), None);
    }

    #[test]
    fn test_slices_are_bounds_checked() {
        let mut buf = [0u8; 4];
        write_slice(&mut buf, 16, 18, &[1, 2]).unwrap();
        assert_eq!(read_slice(&buf, 16, 18, 2).unwrap(), &[1, 2]);
        assert!(read_slice(&buf, 16, 19, 2).is_err());
    }
}
