//! Sparse × sparse matmul: candidate emission and final coalesce

use rayon::prelude::*;

use sparge_core::{CoalesceState, CooTensor, Error, Result, SparseTensor};

use crate::util::{i64_to_usize, require_matrix, SMALL_NNZ_LIMIT};

/// C = A @ B for valued sparse matrices, returning a coalesced sparse
/// result of sparse shape (A rows, B cols).
///
/// B's entries are grouped by contraction row with a counting sort; every
/// matching pair (i, k, va) and (k, j, vb) emits a candidate (i, j, va*vb).
/// Candidates are not pre-merged: the final coalesce sums duplicates, which
/// is the sum over the contracted index.
pub fn spspmm_coo(
    a: &CooTensor<f64, i64>,
    b: &CooTensor<f64, i64>,
) -> Result<CooTensor<f64, i64>> {
    let av = a
        .values()
        .ok_or(Error::Value("spspmm requires stored values on both operands"))?;
    let bv = b
        .values()
        .ok_or(Error::Value("spspmm requires stored values on both operands"))?;
    require_matrix(a)?;
    require_matrix(b)?;

    let m = a.sparse_shape()[0];
    let ka = a.sparse_shape()[1];
    let kb = b.sparse_shape()[0];
    let n = b.sparse_shape()[1];
    if ka != kb {
        return Err(Error::shape(&[ka], &[kb]));
    }

    // Group B's entries by row: indptr + per-row entry order.
    let nnz_b = b.nnz();
    let brow = b.index_row(0);
    let bcol = b.index_row(1);
    let mut indptr = vec![0usize; kb + 1];
    for &r in brow {
        indptr[i64_to_usize(r) + 1] += 1;
    }
    for r in 0..kb {
        indptr[r + 1] += indptr[r];
    }
    let mut order = vec![0usize; nnz_b];
    let mut next = indptr.clone();
    for (p, &r) in brow.iter().enumerate() {
        let r = i64_to_usize(r);
        order[next[r]] = p;
        next[r] += 1;
    }

    let arow = a.index_row(0);
    let acol = a.index_row(1);
    let nnz_a = a.nnz();

    let candidates: Vec<(i64, i64, f64)> = if nnz_a <= SMALL_NNZ_LIMIT {
        let mut out = Vec::new();
        for p in 0..nnz_a {
            let k = i64_to_usize(acol[p]);
            for &q in &order[indptr[k]..indptr[k + 1]] {
                out.push((arow[p], bcol[q], av[p] * bv[q]));
            }
        }
        out
    } else {
        (0..nnz_a)
            .into_par_iter()
            .flat_map_iter(|p| {
                let k = i64_to_usize(acol[p]);
                order[indptr[k]..indptr[k + 1]]
                    .iter()
                    .map(move |&q| (arow[p], bcol[q], av[p] * bv[q]))
            })
            .collect()
    };

    let nc = candidates.len();
    let mut indices = Vec::with_capacity(2 * nc);
    indices.extend(candidates.iter().map(|&(i, _, _)| i));
    indices.extend(candidates.iter().map(|&(_, j, _)| j));
    let values: Vec<f64> = candidates.iter().map(|&(_, _, v)| v).collect();

    let raw = CooTensor::from_parts_unchecked(
        indices,
        2,
        Some(values),
        Vec::new(),
        vec![m, n],
        CoalesceState::NotCoalesced,
    );
    Ok(raw.coalesce(true))
}
