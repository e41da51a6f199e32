use std::time::Duration;

use gauss_core::{AugmentedMatrix, GaussCoreError, Solution};

#[derive(Debug)]
pub struct SolveResult<M> {
    pub x: Solution, // Solution vector
    pub metadata: M, // Metadata about the solve process
}

// --- Algorithm Trait Definition ---
/// Trait representing a specific linear system solving algorithm.
///
/// Implementations must be callable concurrently from independent threads:
/// every call owns whatever buffers and workers it creates.
pub trait SolveAlgorithm {
    type Metadata: std::fmt::Debug;

    /// Solves the augmented system `[A | b]` for x.
    ///
    /// The input is never modified; engines work on their own copy.
    fn solve(
        &self,
        matrix: &AugmentedMatrix,
    ) -> Result<SolveResult<Self::Metadata>, GaussCoreError>;

    // Helper for input validation, called before any allocation or spawning.
    fn validate_inputs(&self, matrix: &AugmentedMatrix) -> Result<(), GaussCoreError> {
        matrix.validate_system()
    }
}

// --- Algorithm Implementations ---

pub(crate) mod elimination;
pub mod parallel;
pub mod sequential;

// --- Algorithm Struct Definitions ---

/// Single-threaded Gaussian elimination without pivoting, followed by
/// back-substitution. Also the oracle the parallel engine is checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialElimination;

impl SequentialElimination {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequentialMetadata {
    pub elapsed: Duration,
}

/// Gaussian elimination distributed over a pool of forked worker processes
/// that share the matrix through an anonymous shared mapping.
#[derive(Debug, Clone, Default)]
pub struct ParallelElimination {
    /// Requested number of worker processes. `None` (or zero) uses the
    /// available parallelism of the host. Always clamped to `1..=rows-1`.
    pub worker_count: Option<usize>,
}

impl ParallelElimination {
    /// Creates a parallel engine sized from the host's available parallelism.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parallel engine with an explicit worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
        }
    }

    /// Number of worker processes a solve of `rows` unknowns will spawn.
    pub fn process_budget(&self, rows: usize) -> usize {
        let requested = match self.worker_count {
            Some(count) if count > 0 => count,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };
        requested.clamp(1, rows.saturating_sub(1).max(1))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelMetadata {
    pub elapsed: Duration,
    /// Worker processes spawned; zero when the solve was delegated to the
    /// sequential engine.
    pub workers: usize,
    /// Pivot columns that needed a barrier round.
    pub rounds: usize,
    /// `Work` tasks sent over all rounds.
    pub tasks_dispatched: usize,
}
