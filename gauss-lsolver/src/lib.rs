//! `gauss-lsolver`: Gaussian elimination engines for dense augmented systems.
//!
//! Two engines solve `[A | b]` without pivoting: a single-threaded reference
//! implementation and a process-parallel one in which forked workers reduce
//! disjoint row ranges of a shared mapping, one barrier round per pivot column.

// Core modules
pub mod algorithms;

use algorithms::{ParallelElimination, SequentialElimination, SolveAlgorithm};

// Re-export from gauss_core
pub use gauss_core::{
    AugmentedMatrix, EliminationPhase, GaussCoreError, Matrix, Solution, Vector, PIVOT_EPSILON,
    SOLUTION_TOLERANCE,
};

/// Solves the system on the calling thread.
pub fn solve_sequential(matrix: &AugmentedMatrix) -> Result<Solution, GaussCoreError> {
    Ok(SequentialElimination::new().solve(matrix)?.x)
}

/// Solves the system with a freshly spawned pool of worker processes.
///
/// `worker_count` of `None` sizes the pool from the host's available
/// parallelism. Each call owns its pool and shared buffer, so independent
/// calls may run concurrently.
pub fn solve_parallel(
    matrix: &AugmentedMatrix,
    worker_count: Option<usize>,
) -> Result<Solution, GaussCoreError> {
    let algorithm = ParallelElimination { worker_count };
    Ok(algorithm.solve(matrix)?.x)
}
