use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gauss_core::GaussCoreError;
use thiserror::Error;
use validator::ValidationErrors;

use crate::model::ErrorResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Input validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("Matrix has {rows} rows, this server accepts at most {max}")]
    TooLarge { rows: usize, max: usize },

    #[error("{requested} workers requested, this server allows at most {max}")]
    TooManyWorkers { requested: usize, max: usize },

    #[error("Solve failed: {0}")]
    Solve(#[from] GaussCoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation Error", false),
            AppError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "Matrix Too Large", false),
            AppError::TooManyWorkers { .. } => (StatusCode::BAD_REQUEST, "Too Many Workers", false),
            AppError::Solve(GaussCoreError::SingularMatrix { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Singular Matrix", false)
            }
            AppError::Solve(err) if err.is_input_error() => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid Input", false)
            }
            AppError::Solve(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Solver Execution Error", true),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", true),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, retryable) = self.parts();
        let details = match &self {
            AppError::Validation(err) => Some(
                err.field_errors()
                    .into_iter()
                    .flat_map(|(_, errors)| errors.iter().map(|e| e.to_string()))
                    .collect(),
            ),
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        let body = Json(ErrorResponse {
            status_code: status.as_u16(),
            error: error_type.to_string(),
            message: self.to_string(),
            retryable,
            details,
        });

        (status, body).into_response()
    }
}
