use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{extract::State, Json};
use gauss_core::{AugmentedMatrix, Matrix};
use gauss_lsolver::algorithms::{ParallelElimination, SequentialElimination, SolveAlgorithm};
use validator::Validate;

use crate::{
    config::ServiceConfig,
    error::AppError,
    model::{ErrorResponse, SolveRequest, SolveResponse},
    verify::{VerificationJob, VerificationQueue},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// `None` when cross-validation is disabled.
    pub verifier: Option<VerificationQueue>,
    pub next_request_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: ServiceConfig, verifier: Option<VerificationQueue>) -> Self {
        Self {
            config: Arc::new(config),
            verifier,
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Validates the payload and converts it into a matrix.
    fn accept(&self, payload: SolveRequest) -> Result<(u64, AugmentedMatrix), AppError> {
        payload.validate()?;
        if payload.rows > self.config.max_rows {
            return Err(AppError::TooLarge {
                rows: payload.rows,
                max: self.config.max_rows,
            });
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let matrix = AugmentedMatrix::try_from(payload)?;
        tracing::info!(request_id, "Received matrix {}x{}", matrix.rows(), matrix.cols());
        Ok((request_id, matrix))
    }
}

#[utoipa::path(
    post,
    path = "/solve",
    request_body = SolveRequest,
    responses(
        (status = 200, description = "System solved by the parallel engine.", body = SolveResponse),
        (status = 400, description = "Malformed request payload or too many workers requested.", body = ErrorResponse),
        (status = 413, description = "Matrix exceeds the server's row limit.", body = ErrorResponse),
        (status = 422, description = "Matrix shape is invalid or the system is singular.", body = ErrorResponse),
        (status = 500, description = "Worker, IPC or resource failure; the request may be retried.", body = ErrorResponse)
    ),
    tag = "Gauss Webservice"
)]
pub async fn solve_handler(
    State(state): State<AppState>,
    Json(payload): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, AppError> {
    let worker_count = payload.workers.or(state.config.default_workers);
    if let Some(requested) = worker_count.filter(|&w| w > state.config.max_workers) {
        return Err(AppError::TooManyWorkers {
            requested,
            max: state.config.max_workers,
        });
    }
    let (request_id, matrix) = state.accept(payload)?;
    let worker_count = worker_count.unwrap_or_else(|| {
        ParallelElimination::new()
            .process_budget(usize::MAX)
            .min(state.config.max_workers)
    });

    // The engine blocks on pipes and waitpid; keep it off the async workers.
    let solve_matrix = matrix.clone();
    let result = tokio::task::spawn_blocking(move || {
        ParallelElimination::with_workers(worker_count).solve(&solve_matrix)
    })
    .await
    .map_err(|e| AppError::Internal(format!("solver task failed: {}", e)))??;

    let elapsed_ms = result.metadata.elapsed.as_millis();
    tracing::info!(
        request_id,
        workers = result.metadata.workers,
        "Parallel solve finished in {} ms",
        elapsed_ms
    );

    if let Some(verifier) = &state.verifier {
        verifier.submit(VerificationJob {
            request_id,
            matrix,
            parallel: result.x.clone(),
        });
    }

    Ok(Json(SolveResponse {
        values: result.x.into_values(),
        elapsed_ms,
        workers: result.metadata.workers,
    }))
}

#[utoipa::path(
    post,
    path = "/solve/sequential",
    request_body = SolveRequest,
    responses(
        (status = 200, description = "System solved by the sequential engine.", body = SolveResponse),
        (status = 400, description = "Malformed request payload.", body = ErrorResponse),
        (status = 413, description = "Matrix exceeds the server's row limit.", body = ErrorResponse),
        (status = 422, description = "Matrix shape is invalid or the system is singular.", body = ErrorResponse)
    ),
    tag = "Gauss Webservice"
)]
pub async fn solve_sequential_handler(
    State(state): State<AppState>,
    Json(payload): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, AppError> {
    let (request_id, matrix) = state.accept(payload)?;

    let result = tokio::task::spawn_blocking(move || SequentialElimination::new().solve(&matrix))
        .await
        .map_err(|e| AppError::Internal(format!("solver task failed: {}", e)))??;

    let elapsed_ms = result.metadata.elapsed.as_millis();
    tracing::info!(request_id, "Sequential solve finished in {} ms", elapsed_ms);

    Ok(Json(SolveResponse {
        values: result.x.into_values(),
        elapsed_ms,
        workers: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(
            ServiceConfig {
                max_rows: 4,
                max_workers: 2,
                ..ServiceConfig::default()
            },
            None,
        )
    }

    fn predefined_request(workers: Option<usize>) -> SolveRequest {
        let (matrix, _) = AugmentedMatrix::predefined();
        SolveRequest {
            rows: 3,
            cols: 4,
            data: matrix.into_data(),
            workers,
        }
    }

    #[tokio::test]
    async fn test_solve_handlers_answer_predefined_system() {
        let Json(parallel) = solve_handler(State(state()), Json(predefined_request(Some(2))))
            .await
            .unwrap();
        assert_eq!(parallel.workers, 2);
        let Json(sequential) = solve_sequential_handler(State(state()), Json(predefined_request(None)))
            .await
            .unwrap();
        for (p, s) in parallel.values.iter().zip(&sequential.values) {
            assert!((p - s).abs() < 1e-6);
        }
        assert!((sequential.values[1] - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_row_limit_and_singular_input() {
        let big = SolveRequest {
            rows: 5,
            cols: 6,
            data: vec![1.0; 30],
            workers: None,
        };
        assert!(matches!(
            solve_handler(State(state()), Json(big)).await,
            Err(AppError::TooLarge { rows: 5, max: 4 })
        ));

        assert!(matches!(
            solve_handler(State(state()), Json(predefined_request(Some(3)))).await,
            Err(AppError::TooManyWorkers { requested: 3, max: 2 })
        ));

        let singular = SolveRequest {
            rows: 2,
            cols: 3,
            data: vec![0.0; 6],
            workers: None,
        };
        assert!(matches!(
            solve_handler(State(state()), Json(singular)).await,
            Err(AppError::Solve(gauss_core::GaussCoreError::SingularMatrix { column: 0, .. }))
        ));
    }
}
