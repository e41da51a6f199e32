use std::fmt::Write;

use gauss_core::{AugmentedMatrix, Matrix};

/// Renders the system with `|` borders and a `:` before the right-hand side.
pub fn format_matrix(matrix: &AugmentedMatrix) -> String {
    let (rows, cols) = matrix.dims();
    let mut out = format!("Matrix {}x{}\n", rows, cols);
    for row in 0..rows {
        out.push('|');
        for (col, value) in matrix.row(row).unwrap_or_default().iter().enumerate() {
            if col + 1 == cols {
                out.push_str(" :");
            }
            let _ = write!(out, "{:>10.4}", value);
        }
        out.push_str(" |\n");
    }
    out
}

pub fn format_vector(label: &str, values: &[f64]) -> String {
    let joined = values
        .iter()
        .map(|v| format!("{:.6}", v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}: [{}]", label, joined)
}
