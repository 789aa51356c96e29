//! Jacobi-preconditioned BiCGStab for complex non-Hermitian systems.
//!
//! Convergence is declared when `||r|| <= max(rel_tolerance * ||b||, abs_tolerance)`;
//! divergence when `||r|| > divergence_tolerance * ||b||`.

use super::sparse::{CsrMatrix, SparseError};
use num_complex::Complex64;

const BREAKDOWN_EPSILON: f64 = 1.0e-300;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BiCgstabError {
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
    #[error("operator application failed: {0}")]
    Operator(String),
}

impl From<SparseError> for BiCgstabError {
    fn from(error: SparseError) -> Self {
        Self::Operator(error.to_string())
    }
}

/// `y = A x` for a square operator; device-backed operators may fail.
pub trait LinearOperator {
    fn dimension(&self) -> usize;
    fn apply(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<(), BiCgstabError>;
}

impl LinearOperator for CsrMatrix {
    fn dimension(&self) -> usize {
        CsrMatrix::dimension(self)
    }

    fn apply(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<(), BiCgstabError> {
        Ok(self.matvec_into(x, y)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiCgstabSettings {
    pub max_iterations: usize,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub divergence_tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiCgstabStatus {
    Converged,
    MaxIterations,
    Diverged,
    Breakdown,
}

impl BiCgstabStatus {
    pub const fn code(self) -> i32 {
        match self {
            Self::Converged => 0,
            Self::MaxIterations => 1,
            Self::Diverged => 2,
            Self::Breakdown => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiCgstabSolution {
    pub x: Vec<Complex64>,
    pub iterations: usize,
    pub residual_norm: f64,
    /// `||r|| / ||b||`, or the absolute residual when `b` is zero.
    pub relative_residual: f64,
    pub status: BiCgstabStatus,
}

impl BiCgstabSolution {
    pub fn converged(&self) -> bool {
        self.status == BiCgstabStatus::Converged
    }
}

pub fn bicgstab<A>(
    operator: &A,
    preconditioner: &[Complex64],
    b: &[Complex64],
    settings: &BiCgstabSettings,
) -> Result<BiCgstabSolution, BiCgstabError>
where
    A: LinearOperator + ?Sized,
{
    let n = operator.dimension();
    if b.len() != n {
        return Err(BiCgstabError::RhsLengthMismatch {
            expected: n,
            actual: b.len(),
        });
    }
    let inverse_diagonal = jacobi_inverse(preconditioner, n);
    let zero = Complex64::new(0.0, 0.0);
    let mut x = vec![zero; n];

    let b_norm = norm(b);
    let threshold = (settings.rel_tolerance * b_norm).max(settings.abs_tolerance);
    let divergence_limit = settings.divergence_tolerance * b_norm.max(f64::MIN_POSITIVE);
    let relative = |residual: f64| {
        if b_norm > 0.0 {
            residual / b_norm
        } else {
            residual
        }
    };
    let finish = |x: Vec<Complex64>,
                  iterations: usize,
                  residual: f64,
                  status: BiCgstabStatus|
     -> Result<BiCgstabSolution, BiCgstabError> {
        Ok(BiCgstabSolution {
            x,
            iterations,
            residual_norm: residual,
            relative_residual: relative(residual),
            status,
        })
    };

    if b_norm <= threshold {
        return finish(x, 0, b_norm, BiCgstabStatus::Converged);
    }

    let mut r = b.to_vec();
    let shadow = r.clone();
    let mut rho = Complex64::new(1.0, 0.0);
    let mut alpha = Complex64::new(1.0, 0.0);
    let mut omega = Complex64::new(1.0, 0.0);
    let mut p = vec![zero; n];
    let mut v = vec![zero; n];
    let mut y = vec![zero; n];
    let mut z = vec![zero; n];
    let mut s = vec![zero; n];
    let mut t = vec![zero; n];
    let mut residual = b_norm;

    for iteration in 1..=settings.max_iterations {
        let rho_next = dot(&shadow, &r);
        if rho_next.norm() < BREAKDOWN_EPSILON {
            return finish(x, iteration - 1, residual, BiCgstabStatus::Breakdown);
        }

        let beta = (rho_next / rho) * (alpha / omega);
        rho = rho_next;
        for i in 0..n {
            p[i] = r[i] + beta * (p[i] - omega * v[i]);
            y[i] = inverse_diagonal[i] * p[i];
        }
        operator.apply(&y, &mut v)?;

        let shadow_v = dot(&shadow, &v);
        if shadow_v.norm() < BREAKDOWN_EPSILON {
            return finish(x, iteration - 1, residual, BiCgstabStatus::Breakdown);
        }
        alpha = rho / shadow_v;

        for i in 0..n {
            s[i] = r[i] - alpha * v[i];
        }
        let s_norm = norm(&s);
        if s_norm <= threshold {
            for i in 0..n {
                x[i] += alpha * y[i];
            }
            return finish(x, iteration, s_norm, BiCgstabStatus::Converged);
        }

        for i in 0..n {
            z[i] = inverse_diagonal[i] * s[i];
        }
        operator.apply(&z, &mut t)?;
        let t_norm_sq = dot(&t, &t);
        if t_norm_sq.norm() < BREAKDOWN_EPSILON {
            return finish(x, iteration, s_norm, BiCgstabStatus::Breakdown);
        }
        omega = dot(&t, &s) / t_norm_sq;

        for i in 0..n {
            x[i] += alpha * y[i] + omega * z[i];
            r[i] = s[i] - omega * t[i];
        }
        residual = norm(&r);

        if !residual.is_finite() || residual > divergence_limit {
            return finish(x, iteration, residual, BiCgstabStatus::Diverged);
        }
        if residual <= threshold {
            return finish(x, iteration, residual, BiCgstabStatus::Converged);
        }
        if omega.norm() < BREAKDOWN_EPSILON {
            return finish(x, iteration, residual, BiCgstabStatus::Breakdown);
        }
    }

    finish(
        x,
        settings.max_iterations,
        residual,
        BiCgstabStatus::MaxIterations,
    )
}

fn jacobi_inverse(diagonal: &[Complex64], n: usize) -> Vec<Complex64> {
    let one = Complex64::new(1.0, 0.0);
    (0..n)
        .map(|i| match diagonal.get(i) {
            Some(value) if value.norm() > BREAKDOWN_EPSILON => one / *value,
            _ => one,
        })
        .collect()
}

/// Conjugated inner product `sum(conj(a) * b)`.
fn dot(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(lhs, rhs)| lhs.conj() * rhs).sum()
}

fn norm(values: &[Complex64]) -> f64 {
    values.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::{BiCgstabSettings, BiCgstabStatus, bicgstab};
    use crate::numerics::sparse::CooMatrix;
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn settings(max_iterations: usize) -> BiCgstabSettings {
        BiCgstabSettings {
            max_iterations,
            abs_tolerance: 1.0e-12,
            rel_tolerance: 1.0e-10,
            divergence_tolerance: 1.0e8,
        }
    }

    fn tridiagonal(n: usize, shift: Complex64) -> CooMatrix {
        let mut coo = CooMatrix::new(n);
        for i in 0..n {
            coo.push(i, i, c(4.0, 0.0) + shift).expect("diagonal");
            if i + 1 < n {
                coo.push(i, i + 1, c(-1.0, 0.0)).expect("upper");
                coo.push(i + 1, i, c(-1.5, 0.0)).expect("lower");
            }
        }
        coo
    }

    #[test]
    fn converges_on_complex_non_symmetric_system() {
        let csr = tridiagonal(12, c(0.0, 0.3)).to_csr();
        let b: Vec<Complex64> = (0..12).map(|i| c(1.0 + i as f64, -0.5)).collect();

        let solution = bicgstab(&csr, &csr.diagonal(), &b, &settings(200)).expect("solve");

        assert_eq!(solution.status, BiCgstabStatus::Converged);
        assert!(solution.iterations <= 200);
        let ax = csr.matvec(&solution.x).expect("matvec");
        let error: f64 = ax
            .iter()
            .zip(&b)
            .map(|(lhs, rhs)| (lhs - rhs).norm_sqr())
            .sum::<f64>()
            .sqrt();
        assert!(error < 1.0e-8, "residual was {error}");
    }

    #[test]
    fn zero_rhs_returns_zero_solution_without_iterating() {
        let csr = tridiagonal(4, c(0.0, 0.0)).to_csr();
        let solution = bicgstab(&csr, &csr.diagonal(), &[c(0.0, 0.0); 4], &settings(10))
            .expect("solve");
        assert!(solution.converged());
        assert_eq!(solution.iterations, 0);
        assert!(solution.x.iter().all(|value| *value == c(0.0, 0.0)));
    }

    #[test]
    fn iteration_cap_is_reported_as_status() {
        let csr = tridiagonal(40, c(0.0, 0.0)).to_csr();
        let b = vec![c(1.0, 0.0); 40];
        let solution = bicgstab(&csr, &[], &b, &settings(1)).expect("solve");
        assert_eq!(solution.status, BiCgstabStatus::MaxIterations);
        assert_eq!(solution.status.code(), 1);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn rhs_length_is_validated() {
        let csr = tridiagonal(3, c(0.0, 0.0)).to_csr();
        let error = bicgstab(&csr, &[], &[c(1.0, 0.0)], &settings(5)).expect_err("rhs");
        assert_eq!(
            error,
            super::BiCgstabError::RhsLengthMismatch {
                expected: 3,
                actual: 1
            }
        );
    }
}
