use super::{CsrMatrix, DenseComplexMatrix};
use faer::linalg::solvers::Solve;
use faer::sparse::{SparseColMat, Triplet};
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SparseLuError {
    #[error("right-hand side has {actual} rows, expected {expected}")]
    RhsLengthMismatch { expected: usize, actual: usize },
    #[error("failed to build the sparse system: {0}")]
    Structure(String),
    #[error("sparse LU factorization failed: {0}")]
    Factorization(String),
    #[error("system is singular; solution column {column} is not finite")]
    Singular { column: usize },
}

/// Factors the system once with faer's sparse LU and solves every column of `rhs`.
pub fn sparse_lu_solve(
    matrix: &CsrMatrix,
    rhs: &DenseComplexMatrix,
) -> Result<DenseComplexMatrix, SparseLuError> {
    let dimension = matrix.dimension();
    if rhs.nrows() != dimension {
        return Err(SparseLuError::RhsLengthMismatch {
            expected: dimension,
            actual: rhs.nrows(),
        });
    }

    let triplets: Vec<Triplet<usize, usize, Complex64>> = matrix
        .entries()
        .map(|(row, col, value)| Triplet::new(row, col, value))
        .collect();
    let system =
        SparseColMat::<usize, Complex64>::try_new_from_triplets(dimension, dimension, &triplets)
            .map_err(|error| SparseLuError::Structure(format!("{error:?}")))?;
    let factors = system
        .as_ref()
        .sp_lu()
        .map_err(|error| SparseLuError::Factorization(format!("{error:?}")))?;
    let solution: DenseComplexMatrix = factors.solve(rhs.as_ref());

    let singular = (0..solution.ncols()).find(|col| {
        (0..solution.nrows()).any(|row| {
            let value = solution[(row, *col)];
            !value.re.is_finite() || !value.im.is_finite()
        })
    });
    match singular {
        Some(column) => Err(SparseLuError::Singular { column }),
        None => Ok(solution),
    }
}
