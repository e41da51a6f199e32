use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GaussCoreError;
use crate::traits::Matrix;

/// Represents an augmented system `[A | b]` stored in row-major order on the CPU.
///
/// The constructor only checks that `data` matches the dimensions; whether the
/// shape is a solvable square system (`cols == rows + 1`) is checked by the
/// solvers through [`AugmentedMatrix::validate_system`], so a malformed request
/// still reaches them and is reported as `InvalidInput`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct AugmentedMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>, // data[row * cols + col]
}

/// Unchecked wire form; deserialization goes through [`AugmentedMatrix::new`].
#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for AugmentedMatrix {
    type Error = GaussCoreError;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        Self::new(raw.rows, raw.cols, raw.data)
    }
}

impl AugmentedMatrix {
    /// Creates a new matrix from raw row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, GaussCoreError> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            GaussCoreError::InvalidInput(format!("Dimensions {}x{} overflow", rows, cols))
        })?;
        if data.len() != expected {
            return Err(GaussCoreError::InvalidInput(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from a list of equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, GaussCoreError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(GaussCoreError::InvalidInput(format!(
                "Row {} has {} entries, expected {}",
                index,
                row.len(),
                cols
            )));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(rows.len(), cols, data)
    }

    /// Creates a matrix with values drawn uniformly from `[-100, 100)`.
    pub fn random(rows: usize, cols: usize, rng: &mut fastrand::Rng) -> Result<Self, GaussCoreError> {
        if rows == 0 || cols == 0 {
            return Err(GaussCoreError::InvalidInput(
                "Matrix dimensions must be positive".to_string(),
            ));
        }
        let data = (0..rows * cols)
            .map(|_| rng.f64() * 200.0 - 100.0)
            .collect();
        log::debug!("Generated random {}x{} matrix", rows, cols);
        Self::new(rows, cols, data)
    }

    /// The 3x4 reference system used by the client and the tests, together
    /// with its exact solution.
    pub fn predefined() -> (Self, Vec<f64>) {
        let matrix = Self {
            rows: 3,
            cols: 4,
            data: vec![
                2.0, 1.0, -1.0, 8.0, //
                -3.0, -1.0, 2.0, -11.0, //
                -2.0, 1.0, 2.0, -3.0,
            ],
        };
        (matrix, vec![2.0, 3.0, -1.0])
    }

    /// Checks the `[A | b]` shape required by both elimination engines.
    pub fn validate_system(&self) -> Result<(), GaussCoreError> {
        if self.rows == 0 {
            return Err(GaussCoreError::InvalidInput(
                "Matrix must have at least one row".to_string(),
            ));
        }
        if self.cols != self.rows + 1 {
            return Err(GaussCoreError::InvalidInput(format!(
                "Augmented matrix must have exactly one more column than rows (dims: {}x{})",
                self.rows, self.cols
            )));
        }
        if self.rows.checked_mul(self.cols) != Some(self.data.len()) {
            return Err(GaussCoreError::InvalidInput(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                self.data.len(),
                self.rows,
                self.cols
            )));
        }
        Ok(())
    }

    /// Returns a slice view of the underlying data vector.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consumes the matrix and returns the row-major data.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Gets the element at the specified row and column.
    /// Returns None if indices are out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    /// Returns one row, or None if out of bounds.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }
}

impl Matrix for AugmentedMatrix {
    type Value = f64;

    fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Text form: `"<rows> <cols> v0 v1 ...\n"`, whitespace separated.
impl fmt::Display for AugmentedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.rows, self.cols)?;
        for value in &self.data {
            write!(f, " {}", value)?;
        }
        writeln!(f)
    }
}

impl FromStr for AugmentedMatrix {
    type Err = GaussCoreError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let mut tokens = payload.split_whitespace();
        let mut header = || -> Result<usize, GaussCoreError> {
            tokens
                .next()
                .and_then(|t| t.parse::<usize>().ok())
                .ok_or_else(|| GaussCoreError::Parse("Invalid matrix header".to_string()))
        };
        let rows = header()?;
        let cols = header()?;
        if rows == 0 || cols == 0 {
            return Err(GaussCoreError::Parse(
                "Matrix dimensions must be positive".to_string(),
            ));
        }

        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| GaussCoreError::Parse("Matrix dimensions overflow".to_string()))?;
        let mut data = Vec::with_capacity(expected);
        for index in 0..expected {
            let value = tokens
                .next()
                .ok_or_else(|| GaussCoreError::Parse("Unexpected end of matrix data".to_string()))?
                .parse::<f64>()
                .map_err(|e| GaussCoreError::Parse(format!("Value {}: {}", index, e)))?;
            data.push(value);
        }
        Self::new(rows, cols, data)
    }
}
