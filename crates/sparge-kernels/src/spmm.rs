//! Sparse × dense matmul: scatter-accumulate into a dense result

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use wide::f64x4;

use sparge_core::{CooTensor, Error, Result, SparseTensor};

use crate::util::{i64_to_usize, require_matrix, SMALL_NNZ_LIMIT};

/// Y = A @ B for a valued sparse matrix A and dense B.
///
/// B may be a vector `(K,)`, a matrix `(K, C)` or batched `(*B, K, C)`
/// where K is A's column extent; the result has shape `(M,)`, `(M, C)` or
/// `(*B, M, C)`. Each stored entry (i, k, v) contributes `v * B[.., k, :]`
/// into row i of the output; the accumulation order is unspecified (float
/// summation order may differ between serial and parallel runs).
pub fn spmm_coo(a: &CooTensor<f64, i64>, b: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let vals = a
        .values()
        .ok_or(Error::Value("spmm requires stored values"))?;
    require_matrix(a)?;
    let m = a.sparse_shape()[0];
    let kdim = a.sparse_shape()[1];

    let b_shape = b.shape();
    let (batch, k_in, cols, vector) = match b.ndim() {
        0 => return Err(Error::shape(&[kdim], b_shape)),
        1 => (1usize, b_shape[0], 1usize, true),
        nd => {
            let batch: usize = b_shape[..nd - 2].iter().product();
            (batch, b_shape[nd - 2], b_shape[nd - 1], false)
        }
    };
    if k_in != kdim {
        return Err(Error::shape(&[kdim], &[k_in]));
    }

    let bflat: Vec<f64>;
    let bslice: &[f64] = match b.as_slice() {
        Some(s) => s,
        None => {
            bflat = b.iter().copied().collect();
            &bflat
        }
    };

    let row = a.index_row(0);
    let col = a.index_row(1);
    let mut y = vec![0.0f64; batch * m * cols];
    for t in 0..batch {
        let bs = &bslice[t * kdim * cols..(t + 1) * kdim * cols];
        let ys = &mut y[t * m * cols..(t + 1) * m * cols];
        spmm_slice(row, col, vals, bs, ys, cols);
    }

    let out_shape: Vec<usize> = if vector {
        vec![m]
    } else {
        let nd = b_shape.len();
        let mut s = b_shape[..nd - 2].to_vec();
        s.push(m);
        s.push(cols);
        s
    };
    ArrayD::from_shape_vec(IxDyn(&out_shape), y).map_err(|e| Error::format(e.to_string()))
}

/// One batch slice: Y (m, k) += A @ B (kdim, k), both row-major.
fn spmm_slice(row: &[i64], col: &[i64], vals: &[f64], b: &[f64], y: &mut [f64], k: usize) {
    let nnz = vals.len();
    if k == 0 || nnz == 0 {
        return;
    }
    let tile = 128usize;
    if nnz <= SMALL_NNZ_LIMIT || k <= tile {
        for p in 0..nnz {
            let i = i64_to_usize(row[p]);
            let j = i64_to_usize(col[p]);
            let v = vals[p];
            let dst = &mut y[i * k..(i + 1) * k];
            let src = &b[j * k..(j + 1) * k];
            for (dc, sc) in dst.iter_mut().zip(src) {
                *dc += v * sc;
            }
        }
        return;
    }

    // Tiles own disjoint output columns, so every thread scans all entries
    // but writes only its own range.
    let y_addr = y.as_mut_ptr() as usize;
    (0..k)
        .step_by(tile)
        .collect::<Vec<_>>()
        .into_par_iter()
        .for_each(|c0| {
            let c1 = (c0 + tile).min(k);
            let tk = c1 - c0;
            let limit4 = tk & !3;
            let y_ptr = y_addr as *mut f64;
            for p in 0..nnz {
                let i = i64_to_usize(row[p]);
                let j = i64_to_usize(col[p]);
                let v = vals[p];
                let dst_base = i * k + c0;
                let src_base = j * k + c0;
                let mut c = 0usize;
                while c < limit4 {
                    let vb = unsafe {
                        let q = b.as_ptr().add(src_base + c).cast::<[f64; 4]>();
                        f64x4::new(core::ptr::read_unaligned(q))
                    };
                    let va = f64x4::splat(v);
                    let vy = unsafe {
                        let q = y_ptr.add(dst_base + c).cast::<[f64; 4]>();
                        f64x4::new(core::ptr::read_unaligned(q))
                    };
                    let r = vy + vb * va;
                    unsafe {
                        let q = y_ptr.add(dst_base + c).cast::<[f64; 4]>();
                        core::ptr::write_unaligned(q, r.to_array());
                    }
                    c += 4;
                }
                while c < tk {
                    unsafe { *y_ptr.add(dst_base + c) += v * *b.as_ptr().add(src_base + c) };
                    c += 1;
                }
            }
        });
}
