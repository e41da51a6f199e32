//! Row-reduction kernels shared by the sequential engine, the worker processes
//! and the coordinator's back-substitution.
//!
//! None of these functions allocate except `back_substitute`'s result vector,
//! which is what lets a forked worker call `reduce_rows` safely.

use gauss_core::{EliminationPhase, GaussCoreError, PIVOT_EPSILON};

/// Fails with `SingularMatrix` when `|pivot| < PIVOT_EPSILON`.
pub(crate) fn check_pivot(
    pivot: f64,
    column: usize,
    phase: EliminationPhase,
) -> Result<f64, GaussCoreError> {
    if pivot.abs() < PIVOT_EPSILON {
        return Err(GaussCoreError::SingularMatrix { column, phase });
    }
    Ok(pivot)
}

/// Eliminates `column` from every row in `rows` using `pivot_row`.
///
/// `rows` holds whole rows of the same width as `pivot_row`; only columns
/// `column..width` are touched since everything left of the pivot is already zero.
pub(crate) fn reduce_rows(pivot_row: &[f64], rows: &mut [f64], column: usize) {
    let width = pivot_row.len();
    let pivot = pivot_row[column];
    for row in rows.chunks_exact_mut(width) {
        let factor = row[column] / pivot;
        for (target, &source) in row[column..].iter_mut().zip(&pivot_row[column..]) {
            *target -= factor * source;
        }
    }
}

/// Solves the upper-triangular system left in `data` (an `n x (n + 1)`
/// row-major buffer), last unknown first.
pub(crate) fn back_substitute(data: &[f64], n: usize) -> Result<Vec<f64>, GaussCoreError> {
    let width = n + 1;
    let mut solution = vec![0.0; n];
    for i in (0..n).rev() {
        let row = &data[i * width..(i + 1) * width];
        let mut rhs = row[n];
        for j in (i + 1)..n {
            rhs -= row[j] * solution[j];
        }
        let pivot = check_pivot(row[i], i, EliminationPhase::BackSubstitution)?;
        solution[i] = rhs / pivot;
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_rows_zeroes_column() {
        let pivot_row = [2.0, 1.0, -1.0, 8.0];
        let mut rows = vec![-3.0, -1.0, 2.0, -11.0, -2.0, 1.0, 2.0, -3.0];
        reduce_rows(&pivot_row, &mut rows, 0);
        assert_eq!(rows[0], 0.0);
        assert_eq!(rows[4], 0.0);
        assert!((rows[1] - 0.5).abs() < 1e-15);
        assert!((rows[7] - 5.0).abs() < 1e-15);
    }

    #[test]
    fn test_reduce_rows_leaves_left_columns() {
        let pivot_row = [0.0, 4.0, 2.0];
        let mut rows = vec![7.0, 2.0, 3.0];
        reduce_rows(&pivot_row, &mut rows, 1);
        assert_eq!(rows, vec![7.0, 0.0, 2.0]);
    }

    #[test]
    fn test_back_substitute_upper_triangular() {
        // x + y = 3, 2y = 4
        let data = [1.0, 1.0, 3.0, 0.0, 2.0, 4.0];
        assert_eq!(back_substitute(&data, 2).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_back_substitute_reports_column() {
        let data = [1.0, 1.0, 3.0, 0.0, 0.0, 4.0];
        let err = back_substitute(&data, 2).unwrap_err();
        assert!(matches!(
            err,
            GaussCoreError::SingularMatrix {
                column: 1,
                phase: EliminationPhase::BackSubstitution
            }
        ));
    }

    #[test]
    fn test_check_pivot_threshold() {
        assert!(check_pivot(1e-12, 0, EliminationPhase::ForwardElimination).is_ok());
        assert!(check_pivot(-9e-13, 0, EliminationPhase::ForwardElimination).is_err());
    }
}
