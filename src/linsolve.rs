use crate::opt::SolverOpts;
use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use sprs::CsMat;

/// Solves the KKT systems arising in the Newton steps of the interior
/// point method. The matrix is square, sparse and generally indefinite.
pub trait LinearSolver {
    fn solve(&self, a_mat: &CsMat<f64>, b: &[f64]) -> Result<Vec<f64>, String>;
}

/// LU factorization with partial pivoting on a densified copy of the
/// system, with optional iterative refinement of the solution.
pub struct DenseLu {
    pub refinement: usize,
}

impl Default for DenseLu {
    fn default() -> Self {
        Self { refinement: 1 }
    }
}

impl DenseLu {
    /// Builds the solver with the refinement pass count taken from the
    /// solver options.
    pub fn from_opts(opts: &SolverOpts) -> Self {
        Self {
            refinement: opts.refinement,
        }
    }
}

impl LinearSolver for DenseLu {
    fn solve(&self, a_mat: &CsMat<f64>, b: &[f64]) -> Result<Vec<f64>, String> {
        let n = b.len();
        if n == 0 {
            return Ok(vec![]);
        }
        if a_mat.rows() != n || a_mat.cols() != n {
            return Err(format!(
                "system must be {}x{}, is {}x{}",
                n,
                n,
                a_mat.rows(),
                a_mat.cols()
            ));
        }

        let mut mat: Mat<f64> = Mat::zeros(n, n);
        for (val, (row, col)) in a_mat.iter() {
            mat.write(row, col, mat.read(row, col) + *val);
        }
        let mut rhs = Mat::zeros(n, 1);
        for i in 0..n {
            rhs.write(i, 0, b[i]);
        }

        let lu = mat.partial_piv_lu();
        let solution = lu.solve(&rhs);
        let mut x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();

        if x.iter().any(|&v| !v.is_finite()) {
            return Err("singular KKT matrix".to_string());
        }

        for _ in 0..self.refinement {
            let mut resid = b.to_vec();
            for (val, (row, col)) in a_mat.iter() {
                resid[row] -= *val * x[col];
            }
            let mut rm = Mat::zeros(n, 1);
            for i in 0..n {
                rm.write(i, 0, resid[i]);
            }
            let dm = lu.solve(&rm);
            for (i, xi) in x.iter_mut().enumerate() {
                *xi += dm.read(i, 0);
            }
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::from_triplets;

    #[test]
    fn test_dense_lu() {
        // [[4, 1, 0], [1, 4, 1], [0, 1, 4]] x = [1, 2, 3]
        let a = from_triplets(
            3,
            3,
            vec![
                (0, 0, 4.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 4.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 4.0),
            ],
        );
        let b = vec![1.0, 2.0, 3.0];
        let x = DenseLu::default().solve(&a, &b).unwrap();

        let mut ax = vec![0.0; 3];
        for (val, (row, col)) in a.iter() {
            ax[row] += *val * x[col];
        }
        for i in 0..3 {
            assert!((ax[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_dense_lu_singular() {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (1, 0, 1.0)]);
        assert!(DenseLu::default().solve(&a, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_dense_lu_empty() {
        let a = from_triplets(0, 0, vec![]);
        assert!(DenseLu::default().solve(&a, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_from_opts_refinement() {
        let opts = SolverOpts {
            refinement: 3,
            ..Default::default()
        };
        assert_eq!(DenseLu::from_opts(&opts).refinement, 3);
    }
}
