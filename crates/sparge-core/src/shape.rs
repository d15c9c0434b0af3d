//! Shape helpers: strides, coordinate flattening, compatibility checks

use crate::error::{Error, Result};

/// Convert i64 to usize, asserting non-negativity.
#[inline]
#[must_use]
pub fn i64_to_usize(x: i64) -> usize {
    debug_assert!(x >= 0);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    {
        x as usize
    }
}

/// Convert usize to i64, asserting it fits.
#[inline]
#[must_use]
pub fn usize_to_i64(x: usize) -> i64 {
    debug_assert!(i64::try_from(x).is_ok());
    #[allow(clippy::cast_possible_wrap)]
    {
        x as i64
    }
}

/// Row-major strides and total extent of `shape`.
///
/// `strides[d]` is the linear step of axis d; the returned extent is the
/// product of all axis extents.
pub fn strides_row_major(shape: &[usize]) -> Result<(Vec<usize>, usize)> {
    let mut strides = vec![1usize; shape.len()];
    let mut acc = 1usize;
    for d in (0..shape.len()).rev() {
        strides[d] = acc;
        acc = acc
            .checked_mul(shape[d])
            .ok_or_else(|| Error::format("shape product overflow"))?;
    }
    Ok((strides, acc))
}

/// Product of axis extents, with overflow reported as a format error.
pub fn size_of(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, &s| {
        acc.checked_mul(s)
            .ok_or_else(|| Error::format("shape product overflow"))
    })
}

/// Fails with a shape error unless the two shapes are equal.
pub fn check_shape_match(expected: &[usize], got: &[usize]) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::shape(expected, got))
    }
}

/// Linearize the dimension-major (D, nnz) buffer `indices` into flat
/// row-major coordinates under `strides`.
///
/// Coordinates are assumed in-bounds (checked construction guarantees it).
#[must_use]
pub fn flatten_indices(indices: &[i64], nnz: usize, strides: &[usize]) -> Vec<i64> {
    let ndim = strides.len();
    let mut flat = Vec::with_capacity(nnz);
    for k in 0..nnz {
        let mut lin = 0usize;
        for d in 0..ndim {
            lin += i64_to_usize(indices[d * nnz + k]) * strides[d];
        }
        flat.push(usize_to_i64(lin));
    }
    flat
}
