use ndarray::{arr1, arr2, arr3};
use sparge_core::{CooTensor, Error, Operand, SparseTensor};
use sparge_kernels::*;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn simple_matrix() -> CooTensor<f64, i64> {
    // A = [[1,0,2],[0,3,0]]
    CooTensor::matrix(2, 3, vec![0, 1, 0], vec![0, 1, 2], vec![1.0, 3.0, 2.0]).unwrap()
}

fn exchange_matrix() -> CooTensor<f64, i64> {
    // A = [[0,2],[3,0]]
    CooTensor::matrix(2, 2, vec![0, 1], vec![1, 0], vec![2.0, 3.0]).unwrap()
}

#[test]
fn test_spmm_matrix() {
    let a = simple_matrix();
    // B row-major (3x2): [[1,2],[3,4],[5,6]]
    let b = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn();
    let y = spmm_coo(&a, &b).unwrap();
    assert_eq!(y.shape(), &[2, 2]);
    assert!(approx_eq(y[[0, 0]], 11.0) && approx_eq(y[[0, 1]], 14.0));
    assert!(approx_eq(y[[1, 0]], 9.0) && approx_eq(y[[1, 1]], 12.0));
}

#[test]
fn test_spmm_vector() {
    let a = simple_matrix();
    let x = arr1(&[10.0, 20.0, 30.0]).into_dyn();
    let y = spmm_coo(&a, &x).unwrap();
    assert_eq!(y.shape(), &[2]);
    assert!(approx_eq(y[[0]], 70.0));
    assert!(approx_eq(y[[1]], 60.0));
}

#[test]
fn test_spmm_batched() {
    let a = simple_matrix();
    // second batch slice is the first one doubled
    let b = arr3(&[
        [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        [[2.0, 4.0], [6.0, 8.0], [10.0, 12.0]],
    ])
    .into_dyn();
    let y = spmm_coo(&a, &b).unwrap();
    assert_eq!(y.shape(), &[2, 2, 2]);
    assert!(approx_eq(y[[0, 0, 0]], 11.0) && approx_eq(y[[0, 1, 1]], 12.0));
    assert!(approx_eq(y[[1, 0, 0]], 22.0) && approx_eq(y[[1, 1, 1]], 24.0));
}

#[test]
fn test_spmm_errors() {
    let a = simple_matrix();
    // contraction extent mismatch
    let b = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
    assert!(matches!(spmm_coo(&a, &b), Err(Error::Shape { .. })));

    let p = CooTensor::from_parts(vec![0, 1, 0, 1], 2, None, Vec::new(), Some(vec![2, 3]))
        .unwrap();
    let b = arr2(&[[1.0], [1.0], [1.0]]).into_dyn();
    assert!(matches!(spmm_coo(&p, &b), Err(Error::Value(_))));
}

#[test]
fn test_spspmm_exchange_squared() {
    let a = exchange_matrix();
    let c = spspmm_coo(&a, &a).unwrap();
    assert!(c.is_coalesced());
    assert_eq!(c.nnz(), 2);
    assert_eq!(c.index_row(0), &[0, 1]);
    assert_eq!(c.index_row(1), &[0, 1]);
    let vals = c.values().unwrap();
    assert!(approx_eq(vals[0], 6.0) && approx_eq(vals[1], 6.0));

    let d = c.to_dense().unwrap();
    assert!(approx_eq(d[[0, 0]], 6.0) && approx_eq(d[[1, 1]], 6.0));
    assert!(approx_eq(d[[0, 1]], 0.0) && approx_eq(d[[1, 0]], 0.0));
}

#[test]
fn test_spspmm_matches_dense_product() {
    let a = simple_matrix();
    let b = transpose(&a).unwrap();
    let c = spspmm_coo(&a, &b).unwrap();
    assert_eq!(c.sparse_shape(), &[2, 2]);

    let da = a.coalesce(true).to_dense().unwrap();
    let db = b.coalesce(true).to_dense().unwrap();
    let dc = c.to_dense().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            let mut expect = 0.0;
            for k in 0..3 {
                expect += da[[i, k]] * db[[k, j]];
            }
            assert!(approx_eq(dc[[i, j]], expect));
        }
    }
}

#[test]
fn test_spspmm_errors() {
    let a = simple_matrix();
    // contraction extents 3 vs 2
    let b = exchange_matrix();
    assert!(matches!(spspmm_coo(&a, &b), Err(Error::Shape { .. })));

    let p = CooTensor::from_parts(vec![0, 0], 2, None, Vec::new(), Some(vec![3, 2])).unwrap();
    assert!(matches!(spspmm_coo(&a, &p), Err(Error::Value(_))));
}

#[test]
fn test_matmul_dispatch() {
    let a = exchange_matrix();

    let c = matmul(&a, Operand::Sparse(&a)).unwrap().into_sparse().unwrap();
    assert!(c.is_coalesced());

    let b = arr2(&[[1.0, 0.0], [0.0, 1.0]]).into_dyn();
    let y = matmul(&a, Operand::Dense(&b)).unwrap().into_dense().unwrap();
    assert!(approx_eq(y[[0, 1]], 2.0) && approx_eq(y[[1, 0]], 3.0));

    assert!(matches!(
        matmul(&a, Operand::Scalar(2.0)),
        Err(Error::Type(_))
    ));
}

#[test]
fn test_transpose() {
    let a = exchange_matrix().coalesce(true);
    let t = transpose(&a).unwrap();
    assert!(t.is_coalesced());
    assert_eq!(t.index_row(0), &[1, 0]);
    assert_eq!(t.index_row(1), &[0, 1]);
    let d = t.to_dense().unwrap();
    assert!(approx_eq(d[[1, 0]], 2.0) && approx_eq(d[[0, 1]], 3.0));
}

#[test]
fn test_tril_triu() {
    // [[1,2,0],[3,4,0],[0,5,6]]
    let a = CooTensor::matrix(
        3,
        3,
        vec![0, 0, 1, 1, 2, 2],
        vec![0, 1, 0, 1, 1, 2],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap()
    .coalesce(true);

    let lo = tril(&a, 0).unwrap();
    assert!(lo.is_coalesced());
    let d = lo.to_dense().unwrap();
    assert!(approx_eq(d[[0, 0]], 1.0) && approx_eq(d[[0, 1]], 0.0));
    assert!(approx_eq(d[[1, 0]], 3.0) && approx_eq(d[[1, 1]], 4.0));
    assert!(approx_eq(d[[2, 1]], 5.0) && approx_eq(d[[2, 2]], 6.0));

    let strict_lo = tril(&a, -1).unwrap();
    let d = strict_lo.to_dense().unwrap();
    assert!(approx_eq(d[[0, 0]], 0.0) && approx_eq(d[[1, 0]], 3.0));
    assert!(approx_eq(d[[2, 1]], 5.0) && approx_eq(d[[2, 2]], 0.0));

    let hi = triu(&a, 0).unwrap();
    let d = hi.to_dense().unwrap();
    assert!(approx_eq(d[[0, 0]], 1.0) && approx_eq(d[[0, 1]], 2.0));
    assert!(approx_eq(d[[1, 0]], 0.0) && approx_eq(d[[2, 2]], 6.0));

    let strict_hi = triu(&a, 1).unwrap();
    assert_eq!(strict_hi.nnz(), 1);
    assert_eq!(strict_hi.index_row(1), &[1]);
}

#[test]
fn test_tril_pattern() {
    let p = CooTensor::from_parts(vec![0, 1, 1, 0], 2, None, Vec::new(), Some(vec![2, 2]))
        .unwrap();
    let lo = tril(&p, 0).unwrap();
    assert!(lo.values().is_none());
    assert_eq!(lo.index_row(0), &[1]);
    assert_eq!(lo.index_row(1), &[0]);
}

#[test]
fn test_spmm_empty() {
    let a = CooTensor::from_parts(
        Vec::new(),
        2,
        Some(Vec::new()),
        Vec::new(),
        Some(vec![2, 3]),
    )
    .unwrap();
    let b = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn();
    let y = spmm_coo(&a, &b).unwrap();
    assert_eq!(y.shape(), &[2, 2]);
    assert!(y.iter().all(|v| approx_eq(*v, 0.0)));
}
