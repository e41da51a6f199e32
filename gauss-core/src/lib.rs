//! # Gauss Core Library
//!
//! Data model shared by the elimination engines: the augmented matrix, the
//! solution vector and the error taxonomy.

pub mod error;
pub mod matrix;
pub mod traits;
pub mod vector;

// Re-export public types
pub use error::{EliminationPhase, GaussCoreError};
pub use matrix::AugmentedMatrix;
pub use vector::Solution;

pub use traits::{Matrix, Vector};

/// Smallest pivot magnitude either engine accepts.
pub const PIVOT_EPSILON: f64 = 1e-12;

/// Absolute tolerance used when cross-validating two solutions.
pub const SOLUTION_TOLERANCE: f64 = 1e-6;
