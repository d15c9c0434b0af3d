//! Structural transforms: transpose and triangular splitting

use sparge_core::{CooTensor, Result, SparseTensor};

use crate::util::require_2d;

/// Transpose a sparse matrix by swapping its index rows and extents.
///
/// Values (including dense batch axes) are untouched; the coalesce state
/// carries over, since swapping axes preserves coordinate distinctness.
pub fn transpose(a: &CooTensor<f64, i64>) -> Result<CooTensor<f64, i64>> {
    require_2d(a)?;
    let nnz = a.nnz();
    let mut indices = Vec::with_capacity(2 * nnz);
    indices.extend_from_slice(a.index_row(1));
    indices.extend_from_slice(a.index_row(0));
    let spshape = vec![a.sparse_shape()[1], a.sparse_shape()[0]];
    Ok(CooTensor::from_parts_unchecked(
        indices,
        2,
        a.values().map(<[f64]>::to_vec),
        a.dense_shape().to_vec(),
        spshape,
        a.state(),
    ))
}

/// Lower triangle: keep entries on or below the k-th diagonal
/// (`col - row <= k`).
pub fn tril(a: &CooTensor<f64, i64>, k: i64) -> Result<CooTensor<f64, i64>> {
    require_2d(a)?;
    Ok(filter_entries(a, |r, c| c - r <= k))
}

/// Upper triangle: keep entries on or above the k-th diagonal
/// (`col - row >= k`).
pub fn triu(a: &CooTensor<f64, i64>, k: i64) -> Result<CooTensor<f64, i64>> {
    require_2d(a)?;
    Ok(filter_entries(a, |r, c| c - r >= k))
}

/// Coordinate-filter-then-construct: keep the entries (and their value
/// slices) whose (row, col) satisfies `keep`. A subset of distinct columns
/// stays distinct, so the coalesce state carries over.
fn filter_entries(
    a: &CooTensor<f64, i64>,
    keep: impl Fn(i64, i64) -> bool,
) -> CooTensor<f64, i64> {
    let nnz = a.nnz();
    let row = a.index_row(0);
    let col = a.index_row(1);
    let kept: Vec<usize> = (0..nnz).filter(|&p| keep(row[p], col[p])).collect();

    let nk = kept.len();
    let mut indices = Vec::with_capacity(2 * nk);
    indices.extend(kept.iter().map(|&p| row[p]));
    indices.extend(kept.iter().map(|&p| col[p]));

    let values = a.values().map(|vals| {
        let prefix: usize = a.dense_shape().iter().product();
        let mut out = Vec::with_capacity(prefix * nk);
        for s in 0..prefix {
            out.extend(kept.iter().map(|&p| vals[s * nnz + p]));
        }
        out
    });

    CooTensor::from_parts_unchecked(
        indices,
        2,
        values,
        a.dense_shape().to_vec(),
        a.sparse_shape().to_vec(),
        a.state(),
    )
}
