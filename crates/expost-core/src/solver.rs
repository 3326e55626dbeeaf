//! Dense linear-system backends.
//!
//! The flow tracer builds one small dense matrix per aggregation window and
//! needs its full inverse. This is for linear algebra only; there is no
//! optimization solver anywhere in this workspace, the optimizer whose
//! results we post-process runs elsewhere.
//!
//! Singularity is always surfaced as an `Err`, never as NaNs in the result:
//! the Gaussian backend fails on a vanishing pivot, the faer backend checks
//! the factored solution for non-finite entries.

use anyhow::{anyhow, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Trait for solving dense linear systems (Ax = b) and inverting A.
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;

    /// Invert a square matrix, column by column against the identity.
    /// Backends may override this with a factorization-based version.
    fn invert(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = matrix.len();
        let mut columns = Vec::with_capacity(n);
        for j in 0..n {
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            columns.push(self.solve(matrix, &e)?);
        }
        // columns[j][i] = inv[i][j]; transpose into row-major
        let mut inv = vec![vec![0.0; n]; n];
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                inv[i][j] = *v;
            }
        }
        Ok(inv)
    }
}

fn check_square(matrix: &[Vec<f64>], rhs_len: Option<usize>) -> Result<usize> {
    let n = matrix.len();
    if let Some(len) = rhs_len {
        if len != n {
            return Err(anyhow!(
                "rhs length ({}) does not match matrix dimension {}",
                len,
                n
            ));
        }
    }
    if matrix.iter().any(|row| row.len() != n) {
        return Err(anyhow!("matrix must be square"));
    }
    Ok(n)
}

#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_square(matrix, Some(rhs.len()))?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut a = matrix.to_vec();
        let mut b = rhs.to_vec();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if a[row][i].abs() > a[pivot][i].abs() {
                    pivot = row;
                }
            }
            if pivot != i {
                a.swap(i, pivot);
                b.swap(i, pivot);
            }

            let diag = a[i][i];
            if diag.abs() < 1e-12 {
                return Err(anyhow!("singular matrix"));
            }

            for value in a[i][i..].iter_mut() {
                *value /= diag;
            }
            b[i] /= diag;

            let pivot_segment = a[i][i..].to_vec();
            for row in 0..n {
                if row == i {
                    continue;
                }
                let factor = a[row][i];
                for (target, &pivot) in a[row][i..].iter_mut().zip(pivot_segment.iter()) {
                    *target -= factor * pivot;
                }
                b[row] -= factor * b[i];
            }
        }

        Ok(b)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_square(matrix, Some(rhs.len()))?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let mut solution = Vec::with_capacity(n);
        for i in 0..n {
            let v = sol.read(i, 0);
            if !v.is_finite() {
                return Err(anyhow!("singular matrix (faer solver)"));
            }
            solution.push(v);
        }
        Ok(solution)
    }

    fn invert(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = check_square(matrix, None)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let eye = Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 });
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&eye);

        let mut inv = vec![vec![0.0; n]; n];
        for (i, row) in inv.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                let v = sol.read(i, j);
                if !v.is_finite() {
                    return Err(anyhow!("singular matrix (faer solver)"));
                }
                *value = v;
            }
        }
        Ok(inv)
    }
}

/// Selectable backend kind, for callers wiring the tracer from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Gauss,
    Faer,
}

impl std::str::FromStr for SolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gauss" => Ok(SolverKind::Gauss),
            "faer" => Ok(SolverKind::Faer),
            other => Err(anyhow!(
                "unknown solver '{}'; supported values: gauss, faer",
                other
            )),
        }
    }
}

impl SolverKind {
    pub fn backend(&self) -> Box<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Box::new(GaussSolver),
            SolverKind::Faer => Box::new(FaerSolver),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn matrix_2x2() -> Vec<Vec<f64>> {
        vec![vec![2.0, 1.0], vec![1.0, 3.0]]
    }

    #[test]
    fn test_gauss_solve() {
        let solution = GaussSolver.solve(&matrix_2x2(), &[5.0, 10.0]).unwrap();
        assert!((solution[0] - 1.0).abs() < 1e-12);
        assert!((solution[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_faer_matches_gauss() {
        let rhs = [5.0, 10.0];
        let gauss = GaussSolver.solve(&matrix_2x2(), &rhs).unwrap();
        let faer = FaerSolver.solve(&matrix_2x2(), &rhs).unwrap();
        for (a, b) in gauss.iter().zip(faer.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_invert_round_trip() {
        let m = matrix_2x2();
        for backend in [&GaussSolver as &dyn LinearSystemBackend, &FaerSolver] {
            let inv = backend.invert(&m).unwrap();
            // M * inv(M) == I
            for i in 0..2 {
                for j in 0..2 {
                    let v: f64 = (0..2).map(|k| m[i][k] * inv[k][j]).sum();
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((v - expected).abs() < 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_singular_matrix_is_error() {
        let singular = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(GaussSolver.invert(&singular).is_err());
        assert!(FaerSolver.invert(&singular).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = GaussSolver.solve(&matrix_2x2(), &[1.0]).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(SolverKind::from_str("faer").unwrap(), SolverKind::Faer);
        assert_eq!(SolverKind::from_str("GAUSS").unwrap(), SolverKind::Gauss);
        assert!(SolverKind::from_str("lapack").is_err());
    }
}
