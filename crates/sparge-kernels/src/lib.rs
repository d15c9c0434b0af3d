//! Parallel and SIMD matmul kernels and structural transforms for sparge
//! COO tensors

pub fn init_parallel() {
    // Rayon auto-detects threads by default; users may set RAYON_NUM_THREADS.
}

pub mod matmul;
pub mod spmm;
pub mod spspmm;
pub mod transform;
pub mod util;

pub use matmul::matmul;
pub use spmm::spmm_coo;
pub use spspmm::spspmm_coo;
pub use transform::{transpose, tril, triu};
