use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SparseError {
    #[error("entry ({row},{col}) is outside a {dimension}x{dimension} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        dimension: usize,
    },
    #[error("vector length mismatch: expected {expected}, got {actual}")]
    VectorLengthMismatch { expected: usize, actual: usize },
}

/// Square matrix in (row, col, value) form. Repeated coordinates add up.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CooMatrix {
    dimension: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<Complex64>,
}

impl CooMatrix {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: Complex64) -> Result<(), SparseError> {
        if row >= self.dimension || col >= self.dimension {
            return Err(SparseError::IndexOutOfBounds {
                row,
                col,
                dimension: self.dimension,
            });
        }
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn to_csr(&self) -> CsrMatrix {
        let mut order: Vec<usize> = (0..self.nnz()).collect();
        order.sort_by_key(|index| (self.rows[*index], self.cols[*index]));

        let mut row_ptrs = vec![0usize; self.dimension + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(self.nnz());
        let mut values: Vec<Complex64> = Vec::with_capacity(self.nnz());
        let mut last: Option<(usize, usize)> = None;

        for index in order {
            let key = (self.rows[index], self.cols[index]);
            if last == Some(key) {
                if let Some(value) = values.last_mut() {
                    *value += self.values[index];
                }
                continue;
            }
            col_indices.push(key.1);
            values.push(self.values[index]);
            row_ptrs[key.0 + 1] += 1;
            last = Some(key);
        }

        for row in 0..self.dimension {
            row_ptrs[row + 1] += row_ptrs[row];
        }

        CsrMatrix {
            dimension: self.dimension,
            row_ptrs,
            col_indices,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    dimension: usize,
    row_ptrs: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<Complex64>,
}

impl CsrMatrix {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, Complex64)> + '_ {
        let range = self.row_ptrs[row]..self.row_ptrs[row + 1];
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Stored entries as `(row, col, value)`, row-major, one per coordinate.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, Complex64)> + '_ {
        (0..self.dimension)
            .flat_map(move |row| self.row(row).map(move |(col, value)| (row, col, value)))
    }

    pub fn diagonal(&self) -> Vec<Complex64> {
        (0..self.dimension)
            .map(|row| {
                self.row(row)
                    .find(|(col, _)| *col == row)
                    .map_or(Complex64::new(0.0, 0.0), |(_, value)| value)
            })
            .collect()
    }

    pub fn matvec_into(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<(), SparseError> {
        if x.len() != self.dimension {
            return Err(SparseError::VectorLengthMismatch {
                expected: self.dimension,
                actual: x.len(),
            });
        }
        if y.len() != self.dimension {
            return Err(SparseError::VectorLengthMismatch {
                expected: self.dimension,
                actual: y.len(),
            });
        }

        for (row, output) in y.iter_mut().enumerate() {
            *output = self.row(row).map(|(col, value)| value * x[col]).sum();
        }
        Ok(())
    }

    pub fn matvec(&self, x: &[Complex64]) -> Result<Vec<Complex64>, SparseError> {
        let mut y = vec![Complex64::new(0.0, 0.0); self.dimension];
        self.matvec_into(x, &mut y)?;
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::{CooMatrix, SparseError};
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn coo(dimension: usize, entries: &[(usize, usize, Complex64)]) -> CooMatrix {
        let mut coo = CooMatrix::with_capacity(dimension, entries.len());
        for (row, col, value) in entries {
            coo.push(*row, *col, *value).expect("entry");
        }
        coo
    }

    #[test]
    fn csr_conversion_sums_duplicate_coordinates() {
        let csr = coo(
            3,
            &[
                (2, 2, c(5.0, 0.0)),
                (0, 0, c(1.0, 1.0)),
                (0, 1, c(2.0, 0.0)),
                (1, 1, c(3.0, 0.0)),
                (0, 0, c(1.0, -1.0)),
            ],
        )
        .to_csr();

        assert_eq!(csr.nnz(), 4);
        assert_eq!(csr.diagonal(), vec![c(2.0, 0.0), c(3.0, 0.0), c(5.0, 0.0)]);
        let product = csr
            .matvec(&[c(1.0, 0.0), c(1.0, 0.0), c(1.0, 0.0)])
            .expect("matvec");
        assert_eq!(product, vec![c(4.0, 0.0), c(3.0, 0.0), c(5.0, 0.0)]);
    }

    #[test]
    fn entries_are_row_major_and_merged() {
        let csr = coo(
            2,
            &[
                (1, 0, c(1.0, 0.0)),
                (0, 1, c(0.0, 2.0)),
                (1, 0, c(1.0, 0.0)),
            ],
        )
        .to_csr();

        let entries: Vec<_> = csr.entries().collect();
        assert_eq!(entries, vec![(0, 1, c(0.0, 2.0)), (1, 0, c(2.0, 0.0))]);
        assert_eq!(csr.dimension(), 2);
    }

    #[test]
    fn out_of_range_entries_and_short_vectors_are_rejected() {
        let mut matrix = CooMatrix::new(2);
        let error = matrix.push(0, 2, c(1.0, 0.0)).expect_err("out of bounds");
        assert_eq!(
            error,
            SparseError::IndexOutOfBounds {
                row: 0,
                col: 2,
                dimension: 2
            }
        );
        assert_eq!(matrix.nnz(), 0);

        let csr = matrix.to_csr();
        let error = csr.matvec(&[c(1.0, 0.0)]).expect_err("short vector");
        assert_eq!(
            error,
            SparseError::VectorLengthMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
