use std::time::Instant;

use gauss_core::{AugmentedMatrix, EliminationPhase, GaussCoreError, Matrix};
use log::debug;

use super::elimination::{back_substitute, check_pivot, reduce_rows};
use super::{SequentialElimination, SequentialMetadata, SolveAlgorithm, SolveResult};

impl SolveAlgorithm for SequentialElimination {
    type Metadata = SequentialMetadata;

    fn solve(
        &self,
        matrix: &AugmentedMatrix,
    ) -> Result<SolveResult<Self::Metadata>, GaussCoreError> {
        self.validate_inputs(matrix)?;
        let start = Instant::now();

        let n = matrix.rows();
        let width = matrix.cols();
        let mut data = matrix.data().to_vec();

        for column in 0..n {
            let (upper, lower) = data.split_at_mut((column + 1) * width);
            let pivot_row = &upper[column * width..];
            check_pivot(pivot_row[column], column, EliminationPhase::ForwardElimination)?;
            reduce_rows(pivot_row, lower, column);
        }

        let x = back_substitute(&data, n)?;
        let elapsed = start.elapsed();
        debug!("Sequential elimination of {}x{} finished in {:?}", n, width, elapsed);

        Ok(SolveResult {
            x: x.into(),
            metadata: SequentialMetadata { elapsed },
        })
    }
}
