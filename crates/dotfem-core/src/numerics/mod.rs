pub mod bicgstab;
pub mod direct;
pub mod sparse;

pub use bicgstab::{
    BiCgstabError, BiCgstabSettings, BiCgstabSolution, BiCgstabStatus, LinearOperator, bicgstab,
};
pub use direct::{SparseLuError, sparse_lu_solve};
pub use sparse::{CooMatrix, CsrMatrix, SparseError};

use faer::Mat;
use num_complex::Complex64;

pub type DenseComplexMatrix = Mat<Complex64>;
pub type DenseRealMatrix = Mat<f64>;

pub fn nan_complex_matrix(nrows: usize, ncols: usize) -> DenseComplexMatrix {
    let mut matrix = DenseComplexMatrix::zeros(nrows, ncols);
    for col in 0..ncols {
        for row in 0..nrows {
            matrix[(row, col)] = Complex64::new(f64::NAN, f64::NAN);
        }
    }
    matrix
}
