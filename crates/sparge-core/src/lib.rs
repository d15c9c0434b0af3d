//! Core COO sparse tensor data model and arithmetic for sparge (pure Rust)

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod coo;
pub mod error;
pub mod nd;
pub mod ops;
pub mod shape;

pub use coo::{CoalesceState, CooRavel, CooTensor};
pub use error::{Error, Result};
pub use nd::SparseTensor;
pub use ops::{DenseOrScalar, Operand, SparseOrDense};
