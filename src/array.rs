//! Compiled arrays - owned, contiguous, row-major buffers of static rank

use core::fmt;

use crate::error::{MarshalError, MarshalResult};

/// Owned multi-dimensional array of rank `R`
///
/// Invariant: `data.len()` equals the product of `dims`.
#[derive(Clone, PartialEq)]
pub struct NdArray<T, const R: usize> {
    dims: [usize; R],
    data: Vec<T>,
}

/// Product of extents, `None` on overflow
pub fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl<T, const R: usize> NdArray<T, R> {
    /// Wrap an existing row-major buffer
    pub fn from_vec(dims: [usize; R], data: Vec<T>) -> MarshalResult<Self> {
        let expected = element_count(&dims).ok_or(MarshalError::ShapeOverflow)?;
        if data.len() != expected {
            return Err(MarshalError::SizeMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    #[inline]
    pub const fn rank(&self) -> usize {
        R
    }

    #[inline]
    pub fn dims(&self) -> &[usize; R] {
        &self.dims
    }

    /// Total number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a multi-index, row-major
    pub fn get(&self, index: [usize; R]) -> Option<&T> {
        let mut offset = 0;
        for (i, d) in index.iter().zip(self.dims.iter()) {
            if i >= d {
                return None;
            }
            offset = offset * d + i;
        }
        self.data.get(offset)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Default + Clone, const R: usize> NdArray<T, R> {
    /// Allocate a default-filled array of the given shape
    pub fn filled_default(dims: [usize; R]) -> MarshalResult<Self> {
        let len = element_count(&dims).ok_or(MarshalError::ShapeOverflow)?;
        Ok(Self {
            dims,
            data: vec![T::default(); len],
        })
    }
}

impl<T: Clone> NdArray<T, 1> {
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            dims: [data.len()],
            data: data.to_vec(),
        }
    }
}

impl<T: fmt::Debug, const R: usize> fmt::Debug for NdArray<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dims", &self.dims)
            .field("data", &self.data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_length() {
        let ok = NdArray::from_vec([2, 3], vec![1.0f64; 6]).unwrap();
        assert_eq!(ok.len(), 6);
        assert_eq!(ok.rank(), 2);

        let err = NdArray::from_vec([2, 3], vec![1.0f64; 5]).unwrap_err();
        assert!(matches!(err, MarshalError::SizeMismatch { expected: 6, found: 5 }));
    }

    #[test]
    fn row_major_indexing() {
        let a = NdArray::from_vec([2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(a.get([0, 2]), Some(&3));
        assert_eq!(a.get([1, 0]), Some(&4));
        assert_eq!(a.get([2, 0]), None);
    }

    #[test]
    fn zero_extent_is_empty() {
        let a = NdArray::<i32, 3>::filled_default([4, 0, 2]).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.dims(), &[4, 0, 2]);
    }

    #[test]
    fn overflowing_shape_rejected() {
        assert!(NdArray::<u8, 2>::filled_default([usize::MAX, 2]).is_err());
    }
}
