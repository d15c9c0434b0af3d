//! COO sparse tensor storage, construction and core transforms

use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::nd::SparseTensor;
use crate::shape::{
    check_shape_match, flatten_indices, i64_to_usize, size_of, strides_row_major, usize_to_i64,
};

/// Coalesce state of a tensor instance.
///
/// `Coalesced` means the construction path has already merged duplicate
/// coordinates (or verified there are none). A checked constructor always
/// starts at `Unknown`; `coalesce` is the transition to `Coalesced`, and
/// operations that provably preserve coordinate distinctness carry the
/// state through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceState {
    Unknown,
    NotCoalesced,
    Coalesced,
}

/// Sparse tensor in coordinate (COO) format.
///
/// Stored entries are addressed by a conceptual `(D, nnz)` integer array
/// kept as one flat dimension-major buffer: the coordinate of entry `k`
/// along sparse axis `d` is `indices[d * nnz + k]`. Values, when present,
/// form a row-major `(*dense_shape, nnz)` buffer: leading dense (batch)
/// axes, one trailing slot per stored entry. A tensor without values is
/// pattern-only, each stored coordinate carrying an implicit unit value.
///
/// Instances are immutable: every operation returns a fresh tensor (or a
/// borrowing view, for `ravel`) and never mutates its operands.
#[derive(Debug, Clone)]
pub struct CooTensor<T, I> {
    pub(crate) indices: Vec<I>,
    pub(crate) values: Option<Vec<T>>,
    pub(crate) spshape: Vec<usize>,
    pub(crate) dense_shape: Vec<usize>,
    pub(crate) nnz: usize,
    pub(crate) state: CoalesceState,
}

impl<T, I> CooTensor<T, I> {
    #[inline]
    #[must_use]
    pub const fn nnz(&self) -> usize {
        self.nnz
    }

    /// Flat dimension-major index buffer of length `sparse_ndim * nnz`.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[I] {
        &self.indices
    }

    /// Coordinates of all entries along sparse axis `d`.
    #[inline]
    #[must_use]
    pub fn index_row(&self, d: usize) -> &[I] {
        debug_assert!(d < self.spshape.len());
        &self.indices[d * self.nnz..(d + 1) * self.nnz]
    }

    /// Flat `(*dense_shape, nnz)` value buffer, if any.
    #[inline]
    #[must_use]
    pub fn values(&self) -> Option<&[T]> {
        self.values.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> CoalesceState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        matches!(self.state, CoalesceState::Coalesced)
    }
}

impl SparseTensor for CooTensor<f64, i64> {
    fn nnz(&self) -> usize {
        self.nnz
    }

    fn sparse_shape(&self) -> &[usize] {
        &self.spshape
    }

    fn dense_shape(&self) -> &[usize] {
        &self.dense_shape
    }

    fn to_dense(&self) -> Result<ArrayD<f64>> {
        self.to_dense_with(1.0)
    }
}

impl CooTensor<f64, i64> {
    /// Validating constructor.
    ///
    /// `indices` is the flat dimension-major buffer of a `(sparse_ndim, N)`
    /// coordinate array. `values`, when given, must hold
    /// `prod(dense_shape) * N` elements in `(*dense_shape, N)` row-major
    /// order. When `spshape` is `None`, each sparse extent is inferred as
    /// `max(coordinates) + 1` along that axis.
    ///
    /// Fails with [`Error::Format`] on: zero sparse axes, an index buffer
    /// whose length is not a multiple of `sparse_ndim`, a sparse shape of
    /// the wrong length, a value buffer of the wrong length, dense axes
    /// without values, negative or out-of-bounds coordinates, or extent
    /// overflow. The resulting state is always [`CoalesceState::Unknown`].
    pub fn from_parts(
        indices: Vec<i64>,
        sparse_ndim: usize,
        values: Option<Vec<f64>>,
        dense_shape: Vec<usize>,
        spshape: Option<Vec<usize>>,
    ) -> Result<Self> {
        if sparse_ndim == 0 {
            return Err(Error::format("at least one sparse axis is required"));
        }
        if indices.len() % sparse_ndim != 0 {
            return Err(Error::format(format!(
                "index buffer length {} is not a multiple of sparse_ndim {sparse_ndim}",
                indices.len()
            )));
        }
        let nnz = indices.len() / sparse_ndim;

        let spshape = match spshape {
            Some(s) => {
                if s.len() != sparse_ndim {
                    return Err(Error::format(format!(
                        "sparse shape must have length {sparse_ndim}, got {}",
                        s.len()
                    )));
                }
                for d in 0..sparse_ndim {
                    for k in 0..nnz {
                        let idx = indices[d * nnz + k];
                        if idx < 0 {
                            return Err(Error::format("indices must be non-negative"));
                        }
                        if !usize::try_from(idx).is_ok_and(|ii| ii < s[d]) {
                            return Err(Error::format("index out of bounds"));
                        }
                    }
                }
                s
            }
            None => {
                let mut inferred = Vec::with_capacity(sparse_ndim);
                for d in 0..sparse_ndim {
                    let row = &indices[d * nnz..(d + 1) * nnz];
                    let mut max = -1i64;
                    for &idx in row {
                        if idx < 0 {
                            return Err(Error::format("indices must be non-negative"));
                        }
                        max = max.max(idx);
                    }
                    inferred.push(i64_to_usize(max + 1));
                }
                inferred
            }
        };

        match &values {
            Some(v) => {
                let expected = size_of(&dense_shape)?
                    .checked_mul(nnz)
                    .ok_or_else(|| Error::format("value buffer length overflow"))?;
                if v.len() != expected {
                    return Err(Error::format(format!(
                        "values must hold {expected} elements ({nnz} entries), got {}",
                        v.len()
                    )));
                }
            }
            None => {
                if !dense_shape.is_empty() {
                    return Err(Error::format("dense axes require values"));
                }
            }
        }

        Ok(Self {
            indices,
            values,
            spshape,
            dense_shape,
            nnz,
            state: CoalesceState::Unknown,
        })
    }

    /// Constructor without validation.
    ///
    /// The caller vouches for every invariant of [`Self::from_parts`] and
    /// for the accuracy of `state`.
    #[inline]
    #[must_use]
    pub fn from_parts_unchecked(
        indices: Vec<i64>,
        sparse_ndim: usize,
        values: Option<Vec<f64>>,
        dense_shape: Vec<usize>,
        spshape: Vec<usize>,
        state: CoalesceState,
    ) -> Self {
        debug_assert!(sparse_ndim > 0 && indices.len() % sparse_ndim == 0);
        let nnz = indices.len() / sparse_ndim;
        Self {
            indices,
            values,
            spshape,
            dense_shape,
            nnz,
            state,
        }
    }

    /// 2-D convenience constructor from assembly triplets.
    pub fn matrix(
        nrows: usize,
        ncols: usize,
        rows: Vec<i64>,
        cols: Vec<i64>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if rows.len() != values.len() || cols.len() != values.len() {
            return Err(Error::format("row/col/value buffers must have equal length"));
        }
        let mut indices = rows;
        indices.extend(cols);
        Self::from_parts(indices, 2, Some(values), Vec::new(), Some(vec![nrows, ncols]))
    }

    /// Densify with stored values, or 1.0 where values are absent.
    pub fn to_dense(&self) -> Result<ArrayD<f64>> {
        self.to_dense_with(1.0)
    }

    /// Densify into an array of the full logical shape.
    ///
    /// Requires state `Coalesced` and fails with [`Error::State`] otherwise,
    /// state `Unknown` included: a plain scatter write assumes distinct
    /// coordinates. `fill_value` is written at stored coordinates of a
    /// pattern-only tensor.
    pub fn to_dense_with(&self, fill_value: f64) -> Result<ArrayD<f64>> {
        if !self.is_coalesced() {
            return Err(Error::State("indices must be coalesced before to_dense"));
        }
        let (sp_strides, sp_size) = strides_row_major(&self.spshape)?;
        let prefix = size_of(&self.dense_shape)?;
        let total = prefix
            .checked_mul(sp_size)
            .ok_or_else(|| Error::format("shape product overflow"))?;

        let mut out = vec![0.0f64; total];
        for k in 0..self.nnz {
            let mut lin = 0usize;
            for d in 0..self.spshape.len() {
                lin += i64_to_usize(self.indices[d * self.nnz + k]) * sp_strides[d];
            }
            match &self.values {
                Some(vals) => {
                    for s in 0..prefix {
                        out[s * sp_size + lin] = vals[s * self.nnz + k];
                    }
                }
                None => out[lin] = fill_value,
            }
        }

        let full = self.shape();
        ArrayD::from_shape_vec(IxDyn(&full), out).map_err(|e| Error::format(e.to_string()))
    }

    /// Merge duplicate coordinates and return a new coalesced tensor.
    ///
    /// Returns an unchanged copy if already coalesced. Duplicate value
    /// slices are summed (duplicates are additive contributions, as in
    /// element assembly). For a pattern-only tensor, `accumulate` decides
    /// whether the result carries duplicate counts as values (`true`) or
    /// stays pattern-only (`false`). Unique coordinates come out in
    /// lexicographic order.
    #[must_use]
    pub fn coalesce(&self, accumulate: bool) -> Self {
        if self.is_coalesced() {
            return self.clone();
        }
        let nnz = self.nnz;
        let ndim = self.spshape.len();

        let mut perm: Vec<usize> = (0..nnz).collect();
        perm.sort_unstable_by(|&a, &b| cmp_columns(&self.indices, nnz, ndim, a, b));

        // Pass 1: representative entry of each run of equal coordinates.
        let mut reps: Vec<usize> = Vec::new();
        for (p, &k) in perm.iter().enumerate() {
            if p == 0 || cmp_columns(&self.indices, nnz, ndim, k, perm[p - 1]).is_ne() {
                reps.push(k);
            }
        }
        let unique = reps.len();

        let mut new_indices = vec![0i64; ndim * unique];
        for (u, &rk) in reps.iter().enumerate() {
            for d in 0..ndim {
                new_indices[d * unique + u] = self.indices[d * nnz + rk];
            }
        }

        // Pass 2: segmented reduction into the unique slots.
        let new_values = match &self.values {
            Some(vals) => {
                let prefix: usize = self.dense_shape.iter().product();
                let mut out = vec![0.0f64; prefix * unique];
                let mut u = 0usize;
                for (p, &k) in perm.iter().enumerate() {
                    if p > 0 && cmp_columns(&self.indices, nnz, ndim, k, perm[p - 1]).is_ne() {
                        u += 1;
                    }
                    for s in 0..prefix {
                        out[s * unique + u] += vals[s * nnz + k];
                    }
                }
                Some(out)
            }
            None if accumulate => {
                let mut counts = vec![0.0f64; unique];
                let mut u = 0usize;
                for (p, &k) in perm.iter().enumerate() {
                    if p > 0 && cmp_columns(&self.indices, nnz, ndim, k, perm[p - 1]).is_ne() {
                        u += 1;
                    }
                    counts[u] += 1.0;
                }
                Some(counts)
            }
            None => None,
        };

        Self::from_parts_unchecked(
            new_indices,
            ndim,
            new_values,
            self.dense_shape.clone(),
            self.spshape.clone(),
            CoalesceState::Coalesced,
        )
    }

    /// Rank-1 view with row-major flattened sparse coordinates.
    ///
    /// The view borrows this tensor's value storage (no copy); its indices
    /// are freshly computed. The coalesce state carries over, since the
    /// linearization is a bijection on coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the sparse extent product overflows `usize`.
    #[must_use]
    pub fn ravel(&self) -> CooRavel<'_> {
        let (strides, extent) =
            strides_row_major(&self.spshape).expect("sparse shape product overflow");
        let flat = flatten_indices(&self.indices, self.nnz, &strides);
        CooRavel {
            indices: flat,
            values: self.values.as_deref(),
            dense_shape: &self.dense_shape,
            spshape: [extent],
            state: self.state,
        }
    }

    /// Rank-1 copy with row-major flattened sparse coordinates.
    ///
    /// Same coordinates as [`Self::ravel`], but values are copied into an
    /// independently owned tensor.
    ///
    /// # Panics
    ///
    /// Panics if the sparse extent product overflows `usize`.
    #[must_use]
    pub fn flatten(&self) -> Self {
        self.ravel().into_owned()
    }

    /// Reassign the sparse axes to `new_spshape` through the flat
    /// coordinate space (mixed-radix decode/encode).
    ///
    /// Dense axes and values are untouched. Fails with [`Error::Shape`]
    /// when the extent products differ.
    pub fn reshape_sparse(&self, new_spshape: &[usize]) -> Result<Self> {
        if new_spshape.is_empty() {
            return Err(Error::format("at least one sparse axis is required"));
        }
        let (old_strides, old_size) = strides_row_major(&self.spshape)?;
        let (new_strides, new_size) = strides_row_major(new_spshape)?;
        if old_size != new_size {
            return Err(Error::shape(new_spshape, &self.spshape));
        }

        let nnz = self.nnz;
        let flat = flatten_indices(&self.indices, nnz, &old_strides);
        let new_ndim = new_spshape.len();
        let mut new_indices = vec![0i64; new_ndim * nnz];
        for (k, &f) in flat.iter().enumerate() {
            let mut lin = i64_to_usize(f);
            for d in 0..new_ndim {
                new_indices[d * nnz + k] = usize_to_i64(lin / new_strides[d]);
                lin %= new_strides[d];
            }
        }

        Ok(Self::from_parts_unchecked(
            new_indices,
            new_ndim,
            self.values.clone(),
            self.dense_shape.clone(),
            new_spshape.to_vec(),
            self.state,
        ))
    }

    /// Fails with [`Error::Shape`] unless `other` has the same full shape.
    pub(crate) fn check_same_shape(&self, other_shape: &[usize]) -> Result<()> {
        check_shape_match(&self.shape(), other_shape)
    }
}

/// Lexicographic comparison of two coordinate columns of a dimension-major
/// index buffer.
#[inline]
fn cmp_columns(indices: &[i64], nnz: usize, ndim: usize, a: usize, b: usize) -> std::cmp::Ordering {
    for d in 0..ndim {
        let ord = indices[d * nnz + a].cmp(&indices[d * nnz + b]);
        if ord.is_ne() {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

/// Rank-1 flattened view of a [`CooTensor`].
///
/// Borrows the source tensor's value storage; the borrow checker ties its
/// lifetime to the source. Use [`CooRavel::into_owned`] (or
/// [`CooTensor::flatten`]) for an independent copy.
#[derive(Debug, Clone)]
pub struct CooRavel<'a> {
    indices: Vec<i64>,
    values: Option<&'a [f64]>,
    dense_shape: &'a [usize],
    spshape: [usize; 1],
    state: CoalesceState,
}

impl<'a> CooRavel<'a> {
    /// Flat coordinates into the linearized sparse space.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    /// Borrowed value storage of the source tensor.
    #[inline]
    #[must_use]
    pub const fn values(&self) -> Option<&'a [f64]> {
        self.values
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> CoalesceState {
        self.state
    }

    /// Copy into an independently owned rank-1 tensor.
    #[must_use]
    pub fn into_owned(self) -> CooTensor<f64, i64> {
        CooTensor::from_parts_unchecked(
            self.indices,
            1,
            self.values.map(<[f64]>::to_vec),
            self.dense_shape.to_vec(),
            vec![self.spshape[0]],
            self.state,
        )
    }

    /// Densify with borrowed values, or 1.0 where values are absent.
    ///
    /// Same state precondition as [`CooTensor::to_dense`].
    pub fn to_dense(&self) -> Result<ArrayD<f64>> {
        if !matches!(self.state, CoalesceState::Coalesced) {
            return Err(Error::State("indices must be coalesced before to_dense"));
        }
        let nnz = self.indices.len();
        let sp_size = self.spshape[0];
        let prefix = size_of(self.dense_shape)?;
        let total = prefix
            .checked_mul(sp_size)
            .ok_or_else(|| Error::format("shape product overflow"))?;

        let mut out = vec![0.0f64; total];
        for (k, &idx) in self.indices.iter().enumerate() {
            let lin = i64_to_usize(idx);
            match self.values {
                Some(vals) => {
                    for s in 0..prefix {
                        out[s * sp_size + lin] = vals[s * nnz + k];
                    }
                }
                None => out[lin] = 1.0,
            }
        }

        ArrayD::from_shape_vec(IxDyn(&self.shape()), out).map_err(|e| Error::format(e.to_string()))
    }
}

impl SparseTensor for CooRavel<'_> {
    fn nnz(&self) -> usize {
        self.indices.len()
    }

    fn sparse_shape(&self) -> &[usize] {
        &self.spshape
    }

    fn dense_shape(&self) -> &[usize] {
        self.dense_shape
    }

    fn to_dense(&self) -> Result<ArrayD<f64>> {
        CooRavel::to_dense(self)
    }
}
