//! Utility constants, index casting and operand checks for kernels

use sparge_core::{CooTensor, Error, Result, SparseTensor};

/// Threshold for switching between serial and parallel algorithms (nnz).
pub const SMALL_NNZ_LIMIT: usize = 32 * 1024;

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

/// Fails unless the operand has exactly two sparse axes.
pub fn require_2d(a: &CooTensor<f64, i64>) -> Result<()> {
    if a.sparse_ndim() == 2 {
        Ok(())
    } else {
        Err(Error::shape(&[2], &[a.sparse_ndim()]))
    }
}

/// Fails unless the operand is a plain sparse matrix: two sparse axes and
/// no dense axes.
pub fn require_matrix(a: &CooTensor<f64, i64>) -> Result<()> {
    require_2d(a)?;
    if a.dense_ndim() == 0 {
        Ok(())
    } else {
        Err(Error::shape(&[], a.dense_shape()))
    }
}
