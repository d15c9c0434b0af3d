//! Elementwise arithmetic with closed operand dispatch

use std::borrow::Cow;

use ndarray::{ArrayD, IxDyn};

use crate::coo::{CoalesceState, CooTensor};
use crate::error::{Error, Result};
use crate::nd::SparseTensor;
use crate::shape::{check_shape_match, i64_to_usize, strides_row_major, usize_to_i64};

/// Right-hand operand of `add` and `mul`.
///
/// The dispatch set is closed: every supported operand kind is a variant,
/// and each operation matches exhaustively.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(f64),
    Dense(&'a ArrayD<f64>),
    Sparse(&'a CooTensor<f64, i64>),
}

/// Right-hand operand of `div` and `pow`, whose dispatch set excludes
/// sparse operands by type.
#[derive(Debug, Clone, Copy)]
pub enum DenseOrScalar<'a> {
    Scalar(f64),
    Dense(&'a ArrayD<f64>),
}

/// Result of operations that produce either a sparse tensor or a dense
/// array depending on the operand kind.
#[derive(Debug, Clone)]
pub enum SparseOrDense {
    Sparse(CooTensor<f64, i64>),
    Dense(ArrayD<f64>),
}

impl SparseOrDense {
    #[must_use]
    pub fn into_sparse(self) -> Option<CooTensor<f64, i64>> {
        match self {
            Self::Sparse(t) => Some(t),
            Self::Dense(_) => None,
        }
    }

    #[must_use]
    pub fn into_dense(self) -> Option<ArrayD<f64>> {
        match self {
            Self::Dense(a) => Some(a),
            Self::Sparse(_) => None,
        }
    }
}

impl CooTensor<f64, i64> {
    /// Negate stored values; a pattern-only tensor is returned unchanged
    /// (negating an indicator is a no-op).
    #[must_use]
    pub fn neg(&self) -> Self {
        match &self.values {
            None => self.clone(),
            Some(vals) => Self::from_parts_unchecked(
                self.indices.clone(),
                self.spshape.len(),
                Some(vals.iter().map(|v| -v).collect()),
                self.dense_shape.clone(),
                self.spshape.clone(),
                self.state,
            ),
        }
    }

    /// Add `other`, scaled by `alpha`, dispatching on its kind.
    ///
    /// - Sparse: concatenates entries of both operands without merging
    ///   duplicates (coalesce explicitly for single-valued semantics);
    ///   requires matching full and sparse shapes, and matching
    ///   valuedness.
    /// - Dense: returns the dense `other * alpha` with stored values (1.0
    ///   for a pattern) added at stored coordinates.
    /// - Scalar: shifts *stored entries only*; unstored coordinates stay
    ///   implicit zero.
    pub fn add(&self, other: Operand<'_>, alpha: f64) -> Result<SparseOrDense> {
        match other {
            Operand::Sparse(b) => self.add_sparse(b, alpha).map(SparseOrDense::Sparse),
            Operand::Dense(d) => self.add_dense(d, alpha).map(SparseOrDense::Dense),
            Operand::Scalar(c) => self.add_scalar(c, alpha).map(SparseOrDense::Sparse),
        }
    }

    fn add_sparse(&self, b: &Self, alpha: f64) -> Result<Self> {
        self.check_same_shape(&b.shape())?;
        check_shape_match(&self.spshape, &b.spshape)?;

        let (na, nb) = (self.nnz, b.nnz);
        let ndim = self.spshape.len();
        let mut indices = Vec::with_capacity(ndim * (na + nb));
        for d in 0..ndim {
            indices.extend_from_slice(self.index_row(d));
            indices.extend_from_slice(b.index_row(d));
        }

        let values = match (&self.values, &b.values) {
            (None, None) => None,
            (Some(_), None) => return Err(Error::Value("self has values while other does not")),
            (None, Some(_)) => return Err(Error::Value("self has no values while other does")),
            (Some(va), Some(vb)) => {
                let prefix: usize = self.dense_shape.iter().product();
                let mut out = Vec::with_capacity(prefix * (na + nb));
                for s in 0..prefix {
                    out.extend_from_slice(&va[s * na..(s + 1) * na]);
                    out.extend(vb[s * nb..(s + 1) * nb].iter().map(|v| v * alpha));
                }
                Some(out)
            }
        };

        Ok(Self::from_parts_unchecked(
            indices,
            ndim,
            values,
            self.dense_shape.clone(),
            self.spshape.clone(),
            CoalesceState::NotCoalesced,
        ))
    }

    fn add_dense(&self, d: &ArrayD<f64>, alpha: f64) -> Result<ArrayD<f64>> {
        self.check_same_shape(d.shape())?;
        let (lins, sp_size) = self.sparse_offsets()?;
        let prefix: usize = self.dense_shape.iter().product();

        let mut flat: Vec<f64> = d.iter().map(|v| v * alpha).collect();
        match &self.values {
            Some(vals) => {
                for (k, &lin) in lins.iter().enumerate() {
                    for s in 0..prefix {
                        flat[s * sp_size + lin] += vals[s * self.nnz + k];
                    }
                }
            }
            None => {
                for &lin in &lins {
                    flat[lin] += 1.0;
                }
            }
        }

        ArrayD::from_shape_vec(IxDyn(&self.shape()), flat).map_err(|e| Error::format(e.to_string()))
    }

    fn add_scalar(&self, c: f64, alpha: f64) -> Result<Self> {
        let vals = self
            .values
            .as_ref()
            .ok_or(Error::Value("scalar addition requires stored values"))?;
        Ok(Self::from_parts_unchecked(
            self.indices.clone(),
            self.spshape.len(),
            Some(vals.iter().map(|v| v + alpha * c).collect()),
            self.dense_shape.clone(),
            self.spshape.clone(),
            self.state,
        ))
    }

    /// Multiply by `other` elementwise, dispatching on its kind.
    ///
    /// Dense and scalar operands preserve this tensor's indices (a dense
    /// factor cannot introduce new nonzeros); the dense arm gathers the
    /// operand at stored coordinates, so a pattern-only tensor comes back
    /// valued with the gathered factors. A sparse operand produces the
    /// coordinate intersection via merge-join on sorted flattened
    /// coordinates, each side's duplicates sum-merged first.
    pub fn mul(&self, other: Operand<'_>) -> Result<Self> {
        match other {
            Operand::Dense(d) => self.mul_dense(d),
            Operand::Scalar(c) => self.mul_scalar(c),
            Operand::Sparse(b) => self.mul_sparse(b),
        }
    }

    fn mul_dense(&self, d: &ArrayD<f64>) -> Result<Self> {
        self.check_same_shape(d.shape())?;
        let mut gathered = self.gather(d)?;
        if let Some(vals) = &self.values {
            for (g, v) in gathered.iter_mut().zip(vals) {
                *g *= v;
            }
        }
        Ok(Self::from_parts_unchecked(
            self.indices.clone(),
            self.spshape.len(),
            Some(gathered),
            self.dense_shape.clone(),
            self.spshape.clone(),
            self.state,
        ))
    }

    fn mul_scalar(&self, c: f64) -> Result<Self> {
        let vals = self
            .values
            .as_ref()
            .ok_or(Error::Value("cannot multiply a tensor without values by a scalar"))?;
        Ok(Self::from_parts_unchecked(
            self.indices.clone(),
            self.spshape.len(),
            Some(vals.iter().map(|v| v * c).collect()),
            self.dense_shape.clone(),
            self.spshape.clone(),
            self.state,
        ))
    }

    fn mul_sparse(&self, b: &Self) -> Result<Self> {
        self.check_same_shape(&b.shape())?;
        check_shape_match(&self.spshape, &b.spshape)?;
        if self.values.is_some() != b.values.is_some() {
            return Err(Error::Value(
                "sparse multiply requires both operands valued or both pattern-only",
            ));
        }

        let (strides, _) = strides_row_major(&self.spshape)?;
        let prefix: usize = self.dense_shape.iter().product();
        let (ka, va) = merged_flat(self, &strides);
        let (kb, vb) = merged_flat(b, &strides);

        // Two-pointer join over the sorted unique coordinate keys.
        let mut keys = Vec::new();
        let mut slots = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);
        while i < ka.len() && j < kb.len() {
            match ka[i].cmp(&kb[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    keys.push(ka[i]);
                    slots.push((i, j));
                    i += 1;
                    j += 1;
                }
            }
        }

        let n = keys.len();
        let values = match (&va, &vb) {
            (Some(a), Some(b2)) => {
                let (ua, ub) = (ka.len(), kb.len());
                let mut out = vec![0.0f64; prefix * n];
                for s in 0..prefix {
                    for (m, &(ia, ib)) in slots.iter().enumerate() {
                        out[s * n + m] = a[s * ua + ia] * b2[s * ub + ib];
                    }
                }
                Some(out)
            }
            _ => None,
        };

        let ndim = self.spshape.len();
        let mut indices = vec![0i64; ndim * n];
        for (m, &key) in keys.iter().enumerate() {
            let mut lin = key;
            for d in 0..ndim {
                indices[d * n + m] = usize_to_i64(lin / strides[d]);
                lin %= strides[d];
            }
        }

        Ok(Self::from_parts_unchecked(
            indices,
            ndim,
            values,
            self.dense_shape.clone(),
            self.spshape.clone(),
            CoalesceState::Coalesced,
        ))
    }

    /// Divide stored values by `other` elementwise; index-preserving.
    ///
    /// Division by zero follows IEEE semantics (inf/nan), not an error.
    pub fn div(&self, other: DenseOrScalar<'_>) -> Result<Self> {
        let vals = self
            .values
            .as_ref()
            .ok_or(Error::Value("cannot divide a tensor without values"))?;
        let new_values = match other {
            DenseOrScalar::Scalar(c) => vals.iter().map(|v| v / c).collect(),
            DenseOrScalar::Dense(d) => {
                self.check_same_shape(d.shape())?;
                let gathered = self.gather(d)?;
                vals.iter().zip(&gathered).map(|(v, g)| v / g).collect()
            }
        };
        Ok(Self::from_parts_unchecked(
            self.indices.clone(),
            self.spshape.len(),
            Some(new_values),
            self.dense_shape.clone(),
            self.spshape.clone(),
            self.state,
        ))
    }

    /// Raise stored values to `other` elementwise; index-preserving.
    pub fn pow(&self, other: DenseOrScalar<'_>) -> Result<Self> {
        let vals = self
            .values
            .as_ref()
            .ok_or(Error::Value("cannot raise a tensor without values to a power"))?;
        let new_values = match other {
            DenseOrScalar::Scalar(c) => vals.iter().map(|v| v.powf(c)).collect(),
            DenseOrScalar::Dense(d) => {
                self.check_same_shape(d.shape())?;
                let gathered = self.gather(d)?;
                vals.iter().zip(&gathered).map(|(v, g)| v.powf(*g)).collect()
            }
        };
        Ok(Self::from_parts_unchecked(
            self.indices.clone(),
            self.spshape.len(),
            Some(new_values),
            self.dense_shape.clone(),
            self.spshape.clone(),
            self.state,
        ))
    }

    /// Linearized sparse offset of each entry, plus the sparse extent
    /// product.
    fn sparse_offsets(&self) -> Result<(Vec<usize>, usize)> {
        let (strides, sp_size) = strides_row_major(&self.spshape)?;
        let ndim = strides.len();
        let mut lins = Vec::with_capacity(self.nnz);
        for k in 0..self.nnz {
            let mut lin = 0usize;
            for d in 0..ndim {
                lin += i64_to_usize(self.indices[d * self.nnz + k]) * strides[d];
            }
            lins.push(lin);
        }
        Ok((lins, sp_size))
    }

    /// Gather a dense operand of the full logical shape at the stored
    /// coordinates, as a `(*dense_shape, nnz)` buffer.
    fn gather(&self, d: &ArrayD<f64>) -> Result<Vec<f64>> {
        let (lins, sp_size) = self.sparse_offsets()?;
        let prefix: usize = self.dense_shape.iter().product();
        let flat = to_flat(d);
        let mut out = Vec::with_capacity(prefix * self.nnz);
        for s in 0..prefix {
            for &lin in &lins {
                out.push(flat[s * sp_size + lin]);
            }
        }
        Ok(out)
    }
}

/// Logical row-major flat view of a dense array, borrowing when the layout
/// already is standard.
fn to_flat(a: &ArrayD<f64>) -> Cow<'_, [f64]> {
    match a.as_slice() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(a.iter().copied().collect()),
    }
}

/// Sum-merge duplicate coordinates of one operand into sorted unique flat
/// keys; pattern-only operands just dedup.
fn merged_flat(
    t: &CooTensor<f64, i64>,
    strides: &[usize],
) -> (Vec<usize>, Option<Vec<f64>>) {
    let nnz = t.nnz;
    let ndim = strides.len();
    let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(nnz);
    for k in 0..nnz {
        let mut lin = 0usize;
        for d in 0..ndim {
            lin += i64_to_usize(t.indices[d * nnz + k]) * strides[d];
        }
        pairs.push((lin, k));
    }
    pairs.sort_unstable_by_key(|&(lin, _)| lin);

    let mut keys: Vec<usize> = Vec::new();
    for &(lin, _) in &pairs {
        if keys.last() != Some(&lin) {
            keys.push(lin);
        }
    }

    let values = t.values.as_ref().map(|vals| {
        let prefix: usize = t.dense_shape.iter().product();
        let unique = keys.len();
        let mut out = vec![0.0f64; prefix * unique];
        let mut u = 0usize;
        for (p, &(lin, k)) in pairs.iter().enumerate() {
            if p > 0 && pairs[p - 1].0 != lin {
                u += 1;
            }
            for s in 0..prefix {
                out[s * unique + u] += vals[s * nnz + k];
            }
        }
        out
    });

    (keys, values)
}
