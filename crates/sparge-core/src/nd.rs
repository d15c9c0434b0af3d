//! Base capability trait shared by sparse tensor formats

use ndarray::ArrayD;

use crate::error::Result;

/// Shape, storage and densification queries common to sparse tensor
/// formats.
///
/// Consumers that only need these capabilities (solver drivers, assembly
/// loops) can bound on this trait and stay format-polymorphic; a compressed
/// format would satisfy the same contract.
pub trait SparseTensor {
    /// Number of stored entries.
    fn nnz(&self) -> usize;

    /// Extents of the sparse (coordinate-indexed) axes.
    fn sparse_shape(&self) -> &[usize];

    /// Extents of the leading dense axes; empty for valueless tensors and
    /// unbatched values.
    fn dense_shape(&self) -> &[usize];

    /// Densify into an array of the full logical shape, with 1.0 standing
    /// in for absent values.
    ///
    /// Implementations may put a coalesce-state precondition on this and
    /// fail with [`crate::Error::State`].
    fn to_dense(&self) -> Result<ArrayD<f64>>;

    fn sparse_ndim(&self) -> usize {
        self.sparse_shape().len()
    }

    fn dense_ndim(&self) -> usize {
        self.dense_shape().len()
    }

    fn ndim(&self) -> usize {
        self.dense_ndim() + self.sparse_ndim()
    }

    /// Full logical shape, dense axes leading.
    fn shape(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.ndim());
        out.extend_from_slice(self.dense_shape());
        out.extend_from_slice(self.sparse_shape());
        out
    }

    /// Total number of logical elements, implicit zeros included.
    fn size(&self) -> usize {
        self.dense_shape()
            .iter()
            .chain(self.sparse_shape())
            .product()
    }

    /// Stored fraction of the sparse coordinate space.
    #[allow(clippy::cast_precision_loss)]
    fn density(&self) -> f64 {
        let sp: usize = self.sparse_shape().iter().product();
        if sp == 0 {
            0.0
        } else {
            self.nnz() as f64 / sp as f64
        }
    }
}
