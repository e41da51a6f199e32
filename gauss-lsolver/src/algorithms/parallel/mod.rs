//! Process-parallel elimination.
//!
//! The coordinator copies the matrix into a shared mapping, forks a fixed
//! pool of workers and, for every pivot column, hands each active worker a
//! disjoint range of the rows below the pivot. It waits for every ack of a
//! round before reading the next pivot, because that pivot row was itself
//! one of the rows reduced in the round. Back-substitution stays on the
//! coordinator once all workers have exited.

pub mod partition;
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) mod transport;
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) mod worker;

use gauss_core::{EliminationPhase, GaussCoreError};
use log::trace;

use super::elimination::check_pivot;
use partition::partition_rows;
use transport::{AckMessage, TaskMessage, STATUS_OK};
use worker::RegionView;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod pool;
        mod shared_buffer;

        use std::time::Instant;

        use gauss_core::{AugmentedMatrix, Matrix};
        use log::{debug, info};

        use super::{ParallelElimination, ParallelMetadata, SequentialElimination, SolveAlgorithm, SolveResult};
        use super::elimination::back_substitute;
        use pool::WorkerPool;
        use shared_buffer::SharedBuffer;

        impl SolveAlgorithm for ParallelElimination {
            type Metadata = ParallelMetadata;

            fn solve(
                &self,
                matrix: &AugmentedMatrix,
            ) -> Result<SolveResult<Self::Metadata>, GaussCoreError> {
                self.validate_inputs(matrix)?;
                let n = matrix.rows();
                if n < 2 {
                    debug!("Single unknown, delegating to the sequential engine");
                    let result = SequentialElimination::new().solve(matrix)?;
                    return Ok(SolveResult {
                        x: result.x,
                        metadata: ParallelMetadata {
                            elapsed: result.metadata.elapsed,
                            ..ParallelMetadata::default()
                        },
                    });
                }

                let start = Instant::now();
                let width = matrix.cols();
                let budget = self.process_budget(n);

                // Declared before the pool so it is unmapped after every worker is gone.
                let mut buffer = SharedBuffer::from_slice(matrix.data())?;
                let mut pool = WorkerPool::spawn(buffer.region(width), budget)?;
                let stats = drive_rounds(buffer.region(width), pool.links())?;
                let workers = pool.len();
                pool.shutdown()?;

                let x = back_substitute(buffer.as_slice(), n)?;
                let elapsed = start.elapsed();
                info!(
                    "Parallel elimination of {}x{} with {} workers finished in {:?} ({} rounds, {} tasks)",
                    n, width, workers, elapsed, stats.rounds, stats.tasks_dispatched
                );

                Ok(SolveResult {
                    x: x.into(),
                    metadata: ParallelMetadata {
                        elapsed,
                        workers,
                        rounds: stats.rounds,
                        tasks_dispatched: stats.tasks_dispatched,
                    },
                })
            }
        }
    } else {
        use gauss_core::{AugmentedMatrix, Matrix};

        use super::{ParallelElimination, ParallelMetadata, SequentialElimination, SolveAlgorithm, SolveResult};

        impl SolveAlgorithm for ParallelElimination {
            type Metadata = ParallelMetadata;

            fn solve(
                &self,
                matrix: &AugmentedMatrix,
            ) -> Result<SolveResult<Self::Metadata>, GaussCoreError> {
                self.validate_inputs(matrix)?;
                if matrix.rows() < 2 {
                    let result = SequentialElimination::new().solve(matrix)?;
                    return Ok(SolveResult {
                        x: result.x,
                        metadata: ParallelMetadata {
                            elapsed: result.metadata.elapsed,
                            ..ParallelMetadata::default()
                        },
                    });
                }
                Err(GaussCoreError::ResourceError(
                    "worker processes require a unix target".to_string(),
                ))
            }
        }
    }
}

/// Coordinator end of the channel to one worker.
pub(crate) trait WorkerLink {
    fn send(&mut self, task: &TaskMessage) -> Result<(), GaussCoreError>;
    fn recv_ack(&mut self) -> Result<AckMessage, GaussCoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RoundStats {
    pub rounds: usize,
    pub tasks_dispatched: usize,
}

/// Runs the per-column barrier protocol over `links` until the matrix in
/// `region` is upper triangular.
pub(crate) fn drive_rounds<L: WorkerLink>(
    region: RegionView<'_>,
    links: &mut [L],
) -> Result<RoundStats, GaussCoreError> {
    let n = region.rows();
    let mut stats = RoundStats::default();

    for column in 0..n {
        check_pivot(
            region.get(column, column),
            column,
            EliminationPhase::ForwardElimination,
        )?;

        let ranges = partition_rows(column, n, links.len());
        if ranges.is_empty() {
            continue;
        }

        for (link, rows) in links.iter_mut().zip(&ranges) {
            link.send(&TaskMessage::work(column, rows.clone()))?;
        }

        // Barrier: the next pivot row is one of the rows reduced this round.
        for (index, link) in links.iter_mut().take(ranges.len()).enumerate() {
            let ack = link.recv_ack()?;
            if ack.status != STATUS_OK {
                return Err(GaussCoreError::WorkerFailure(format!(
                    "worker {} reported status {} for column {}",
                    index, ack.status, column
                )));
            }
        }

        stats.rounds += 1;
        stats.tasks_dispatched += ranges.len();
        trace!("Column {} eliminated by {} workers", column, ranges.len());
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::transport::STATUS_INVALID_RANGE;
    use super::worker::execute_task;
    use super::*;

    /// Runs each task inline on `send` and answers with a scripted status.
    struct InlineWorker<'a> {
        region: RegionView<'a>,
        pending: Option<i32>,
        fail_on_column: Option<u64>,
        sent: Vec<TaskMessage>,
    }

    impl<'a> InlineWorker<'a> {
        fn new(region: RegionView<'a>) -> Self {
            Self {
                region,
                pending: None,
                fail_on_column: None,
                sent: Vec::new(),
            }
        }
    }

    impl WorkerLink for InlineWorker<'_> {
        fn send(&mut self, task: &TaskMessage) -> Result<(), GaussCoreError> {
            assert!(self.pending.is_none(), "task sent before previous ack");
            self.sent.push(*task);
            let status = if self.fail_on_column == Some(task.column) {
                STATUS_INVALID_RANGE
            } else {
                execute_task(task, &self.region)
            };
            self.pending = Some(status);
            Ok(())
        }

        fn recv_ack(&mut self) -> Result<AckMessage, GaussCoreError> {
            let status = self.pending.take().expect("ack without task");
            Ok(AckMessage { status })
        }
    }

    fn predefined() -> Vec<f64> {
        vec![
            2.0, 1.0, -1.0, 8.0, //
            -3.0, -1.0, 2.0, -11.0, //
            -2.0, 1.0, 2.0, -3.0,
        ]
    }

    #[test]
    fn test_rounds_produce_upper_triangle() {
        let mut data = predefined();
        let region = RegionView::from_slice(&mut data, 4);
        let mut links = vec![InlineWorker::new(region), InlineWorker::new(region)];

        let stats = drive_rounds(region, &mut links).unwrap();
        assert_eq!(
            stats,
            RoundStats {
                rounds: 2,
                tasks_dispatched: 3
            }
        );
        // Column 0 split over two workers, column 1 only needs the first.
        assert_eq!(links[0].sent.len(), 2);
        assert_eq!(links[1].sent, vec![TaskMessage::work(0, 2..3)]);
        drop(links);

        for (row, col) in [(1, 0), (2, 0), (2, 1)] {
            assert!(data[row * 4 + col].abs() < 1e-12);
        }
        let x = crate::algorithms::elimination::back_substitute(&data, 3).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-9 && (x[1] - 3.0).abs() < 1e-9 && (x[2] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_worker_status_aborts_solve() {
        let mut data = predefined();
        let region = RegionView::from_slice(&mut data, 4);
        let mut failing = InlineWorker::new(region);
        failing.fail_on_column = Some(1);
        let mut links = vec![failing];

        let err = drive_rounds(region, &mut links).unwrap_err();
        assert!(matches!(err, GaussCoreError::WorkerFailure(_)), "{:?}", err);
    }

    #[test]
    fn test_zero_pivot_stops_before_dispatch() {
        let mut data = vec![
            0.0, 1.0, 1.0, //
            1.0, 1.0, 2.0,
        ];
        let region = RegionView::from_slice(&mut data, 3);
        let mut links = vec![InlineWorker::new(region)];

        let err = drive_rounds(region, &mut links).unwrap_err();
        assert!(matches!(
            err,
            GaussCoreError::SingularMatrix {
                column: 0,
                phase: EliminationPhase::ForwardElimination
            }
        ));
        assert!(links[0].sent.is_empty());
    }
}
