//! Background cross-validation of parallel results against the sequential engine.
//!
//! Jobs go through a bounded queue to a supervisor task that owns every
//! verification it starts (a `JoinSet`), caps how many run at once, and is
//! drained on shutdown. Outcomes are only logged; they never change the
//! response already sent to the client.

use std::time::Duration;

use gauss_core::{AugmentedMatrix, Solution, SOLUTION_TOLERANCE};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

pub struct VerificationJob {
    pub request_id: u64,
    pub matrix: AugmentedMatrix,
    pub parallel: Solution,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Match { max_delta: f64 },
    Mismatch { max_delta: f64 },
    LengthMismatch { parallel: usize, sequential: usize },
}

/// Compares two solutions component-wise with an absolute tolerance.
pub fn compare_solutions(parallel: &Solution, sequential: &Solution, tolerance: f64) -> Comparison {
    match parallel.max_abs_diff(sequential.values()) {
        Some(max_delta) if max_delta <= tolerance => Comparison::Match { max_delta },
        Some(max_delta) => Comparison::Mismatch { max_delta },
        None => Comparison::LengthMismatch {
            parallel: parallel.values().len(),
            sequential: sequential.values().len(),
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationSummary {
    pub matched: usize,
    pub mismatched: usize,
    pub failed: usize,
    pub dropped: usize,
}

#[derive(Debug)]
enum Outcome {
    Compared(Comparison),
    Failed,
}

fn verify(job: VerificationJob) -> Outcome {
    let start = std::time::Instant::now();
    let sequential = match gauss_lsolver::solve_sequential(&job.matrix) {
        Ok(solution) => solution,
        Err(e) => {
            tracing::warn!(request_id = job.request_id, "Sequential verification failed: {}", e);
            return Outcome::Failed;
        }
    };
    let elapsed: Duration = start.elapsed();

    let comparison = compare_solutions(&job.parallel, &sequential, SOLUTION_TOLERANCE);
    match comparison {
        Comparison::Match { max_delta } => tracing::info!(
            request_id = job.request_id,
            "Sequential check finished in {} ms; results match (max delta={:e})",
            elapsed.as_millis(),
            max_delta
        ),
        Comparison::Mismatch { max_delta } => tracing::warn!(
            request_id = job.request_id,
            "Sequential check finished in {} ms; results DIVERGE (max delta={:e})",
            elapsed.as_millis(),
            max_delta
        ),
        Comparison::LengthMismatch {
            parallel,
            sequential,
        } => tracing::warn!(
            request_id = job.request_id,
            "Sequential check returned {} values, parallel returned {}",
            sequential,
            parallel
        ),
    }
    Outcome::Compared(comparison)
}

/// Cloneable submission handle held by request handlers.
#[derive(Clone)]
pub struct VerificationQueue {
    tx: mpsc::Sender<VerificationJob>,
}

impl VerificationQueue {
    /// Queues a job; when the queue is full the job is skipped with a warning
    /// rather than delaying the response.
    pub fn submit(&self, job: VerificationJob) -> bool {
        let request_id = job.request_id;
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(request_id, "Verification skipped: {}", e);
                false
            }
        }
    }
}

pub struct VerificationSupervisor {
    queue: VerificationQueue,
    handle: JoinHandle<VerificationSummary>,
}

impl VerificationSupervisor {
    /// Starts the supervisor task. Must be called within a Tokio runtime.
    pub fn start(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        let (tx, rx) = mpsc::channel(max_in_flight * 4);
        let handle = tokio::spawn(supervise(rx, max_in_flight));
        Self {
            queue: VerificationQueue { tx },
            handle,
        }
    }

    pub fn queue(&self) -> VerificationQueue {
        self.queue.clone()
    }

    /// Stops accepting jobs once every queue handle is dropped, waits for the
    /// running verifications and returns what they found.
    pub async fn shutdown(self) -> VerificationSummary {
        drop(self.queue);
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Verification supervisor crashed: {}", e);
                VerificationSummary::default()
            }
        }
    }
}

fn record(summary: &mut VerificationSummary, joined: Result<Outcome, JoinError>) {
    match joined {
        Ok(Outcome::Compared(Comparison::Match { .. })) => summary.matched += 1,
        Ok(Outcome::Compared(_)) => summary.mismatched += 1,
        Ok(Outcome::Failed) => summary.failed += 1,
        Err(e) => {
            tracing::error!("Verification task panicked or was cancelled: {}", e);
            summary.dropped += 1;
        }
    }
}

async fn supervise(
    mut rx: mpsc::Receiver<VerificationJob>,
    max_in_flight: usize,
) -> VerificationSummary {
    let mut tasks = JoinSet::new();
    let mut summary = VerificationSummary::default();

    loop {
        tokio::select! {
            job = rx.recv(), if tasks.len() < max_in_flight => match job {
                Some(job) => {
                    tracing::debug!(request_id = job.request_id, "Starting sequential verification");
                    tasks.spawn_blocking(move || verify(job));
                }
                None => break,
            },
            Some(joined) = tasks.join_next() => record(&mut summary, joined),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        record(&mut summary, joined);
    }
    tracing::info!(?summary, "Verification supervisor stopped");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_solutions() {
        let a = Solution::new(vec![1.0, 2.0]);
        assert_eq!(
            compare_solutions(&a, &Solution::new(vec![1.0, 2.0]), 1e-6),
            Comparison::Match { max_delta: 0.0 }
        );
        assert!(matches!(
            compare_solutions(&a, &Solution::new(vec![1.0, 2.1]), 1e-6),
            Comparison::Mismatch { .. }
        ));
        assert_eq!(
            compare_solutions(&a, &Solution::new(vec![1.0]), 1e-6),
            Comparison::LengthMismatch {
                parallel: 2,
                sequential: 1
            }
        );
    }

    #[tokio::test]
    async fn test_supervisor_drains_jobs_on_shutdown() {
        let supervisor = VerificationSupervisor::start(2);
        let queue = supervisor.queue();
        let (matrix, expected) = AugmentedMatrix::predefined();

        for request_id in 0..3 {
            assert!(queue.submit(VerificationJob {
                request_id,
                matrix: matrix.clone(),
                parallel: Solution::new(expected.clone()),
            }));
        }
        assert!(queue.submit(VerificationJob {
            request_id: 3,
            matrix: matrix.clone(),
            parallel: Solution::new(vec![0.0, 0.0, 0.0]),
        }));
        let singular = AugmentedMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        assert!(queue.submit(VerificationJob {
            request_id: 4,
            matrix: singular,
            parallel: Solution::new(vec![0.0, 0.0]),
        }));
        drop(queue);

        let summary = supervisor.shutdown().await;
        assert_eq!(
            summary,
            VerificationSummary {
                matched: 3,
                mismatched: 1,
                failed: 1,
                dropped: 0
            }
        );
    }
}
