//! Triplet-based construction helpers and matrix-vector products for the
//! sparse matrices used by the power flow formulation and the solver.

use sprs::{CsMat, TriMat};

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed on compression.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> CsMat<f64>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a sparse CSR matrix from triplets (row, col, value).
pub fn from_triplets_csr<I>(nrows: usize, ncols: usize, triplets: I) -> CsMat<f64>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csr()
}

/// Sparse matrix-vector product: `A * x`.
pub fn spmv(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    assert_eq!(a.cols(), x.len());

    let mut y = vec![0.0; a.rows()];
    for (val, (row, col)) in a.iter() {
        y[row] += *val * x[col];
    }
    y
}
