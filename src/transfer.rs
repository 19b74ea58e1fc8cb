//! Bulk transfer between compiled arrays and host buffers
//!
//! The only place raw memory moves across the boundary. No conversion
//! happens here: callers have already matched element width and
//! interpretation against the host's declared type.
//!
//! Every `Element` type is plain data for which any bit pattern is a valid
//! value, which is what makes the byte views below sound.

use core::mem::size_of;
use core::ptr;

use tracing::trace;

use crate::error::{MarshalError, MarshalResult};
use crate::types::Element;

/// Bytes moved by a copy of `len` elements of `T`
#[inline]
pub fn transfer_bytes<T: Element>(len: usize) -> MarshalResult<usize> {
    len.checked_mul(size_of::<T>()).ok_or(MarshalError::ShapeOverflow)
}

/// Copy `dst.len()` elements out of a host buffer
///
/// Returns the number of bytes copied.
///
/// # Safety
/// For a non-empty `dst`, `src` must be valid for reads of
/// `dst.len() * size_of::<T>()` bytes and must not overlap `dst`.
/// `src` need not be aligned.
pub unsafe fn copy_from_host<T: Element>(src: *const T, dst: &mut [T]) -> MarshalResult<usize> {
    let bytes = transfer_bytes::<T>(dst.len())?;
    if bytes == 0 {
        return Ok(0);
    }
    if src.is_null() {
        return Err(MarshalError::NullBuffer { bytes });
    }
    // SAFETY: caller guarantees `src` covers `bytes`; `dst` is exactly `bytes` long.
    ptr::copy_nonoverlapping(src.cast::<u8>(), dst.as_mut_ptr().cast::<u8>(), bytes);
    trace!(target: "wlbridge::transfer", direction = "from_host", element = T::ELEMENT.name(), bytes, "bulk copy");
    Ok(bytes)
}

/// Copy all of `src` into a host buffer
///
/// Returns the number of bytes copied.
///
/// # Safety
/// For a non-empty `src`, `dst` must be valid for writes of
/// `src.len() * size_of::<T>()` bytes and must not overlap `src`.
/// `dst` need not be aligned.
pub unsafe fn copy_to_host<T: Element>(src: &[T], dst: *mut T) -> MarshalResult<usize> {
    let bytes = transfer_bytes::<T>(src.len())?;
    if bytes == 0 {
        return Ok(0);
    }
    if dst.is_null() {
        return Err(MarshalError::NullBuffer { bytes });
    }
    // SAFETY: caller guarantees `dst` covers `bytes`; `src` is exactly `bytes` long.
    ptr::copy_nonoverlapping(src.as_ptr().cast::<u8>(), dst.cast::<u8>(), bytes);
    trace!(target: "wlbridge::transfer", direction = "to_host", element = T::ELEMENT.name(), bytes, "bulk copy");
    Ok(bytes)
}

/// Byte view of an element slice
#[inline]
pub fn bytes_of<T: Element>(data: &[T]) -> &[u8] {
    // SAFETY: elements are padding-free plain data; the view covers the same allocation.
    unsafe { core::slice::from_raw_parts(data.as_ptr().cast::<u8>(), core::mem::size_of_val(data)) }
}

/// Mutable byte view of an element slice
#[inline]
pub(crate) fn bytes_of_mut<T: Element>(data: &mut [T]) -> &mut [u8] {
    // SAFETY: as above, and every byte pattern written back is a valid element.
    unsafe {
        core::slice::from_raw_parts_mut(data.as_mut_ptr().cast::<u8>(), core::mem::size_of_val(data))
    }
}

/// Fill the front of `dst` with `src`, truncating whichever is longer
pub(crate) fn copy_bytes<T: Element>(src: &[u8], dst: &mut [T]) -> usize {
    let dst = bytes_of_mut(dst);
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complex;

    #[test]
    fn copies_exact_byte_count() {
        let src = [1.5f64, -2.0, 3.25];
        let mut dst = [0.0f64; 3];
        let n = unsafe { copy_from_host(src.as_ptr(), &mut dst) }.unwrap();
        assert_eq!(n, 24);
        assert_eq!(dst, src);
    }

    #[test]
    fn copy_to_host_round_trips() {
        let src = [Complex::new(1.0f32, -1.0), Complex::new(0.5, 2.0)];
        let mut host = [Complex::<f32>::default(); 2];
        let n = unsafe { copy_to_host(&src, host.as_mut_ptr()) }.unwrap();
        assert_eq!(n, 16);
        assert_eq!(host, src);
    }

    #[test]
    fn empty_copy_ignores_pointer() {
        let mut dst: [u16; 0] = [];
        let n = unsafe { copy_from_host(core::ptr::null(), &mut dst) }.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn null_source_rejected() {
        let mut dst = [0i32; 4];
        let err = unsafe { copy_from_host(core::ptr::null(), &mut dst) }.unwrap_err();
        assert_eq!(err, MarshalError::NullBuffer { bytes: 16 });
    }

    #[test]
    fn unaligned_source_is_fine() {
        let raw = [0u8, 1, 0, 2, 0];
        let mut dst = [0u16; 2];
        unsafe { copy_from_host(raw.as_ptr().add(1).cast::<u16>(), &mut dst) }.unwrap();
        assert_eq!(bytes_of(&dst), &raw[1..5]);
    }

    #[test]
    fn byte_views() {
        let mut words = [0u64; 2];
        assert_eq!(copy_bytes(&[0xff; 3], &mut words), 3);
        assert_eq!(bytes_of(&words)[..4], [0xff, 0xff, 0xff, 0]);
        assert_eq!(copy_bytes(&[1u8; 32], &mut words), 16);
    }
}
