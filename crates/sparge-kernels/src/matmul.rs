//! Matmul dispatch over the closed operand union

use sparge_core::{CooTensor, Error, Operand, Result, SparseOrDense};

use crate::spmm::spmm_coo;
use crate::spspmm::spspmm_coo;

/// Matrix-multiply `a` with `rhs`, dispatching on the operand kind.
///
/// A sparse operand yields a coalesced sparse product (`spspmm`), a dense
/// operand a dense product (`spmm`); a scalar is outside the dispatch set
/// of matmul.
pub fn matmul(a: &CooTensor<f64, i64>, rhs: Operand<'_>) -> Result<SparseOrDense> {
    match rhs {
        Operand::Sparse(b) => spspmm_coo(a, b).map(SparseOrDense::Sparse),
        Operand::Dense(d) => spmm_coo(a, d).map(SparseOrDense::Dense),
        Operand::Scalar(_) => Err(Error::Type("matmul does not accept scalar operands")),
    }
}
