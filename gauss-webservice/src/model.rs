use gauss_core::{AugmentedMatrix, GaussCoreError};
use serde::{Deserialize, Serialize};
use serde_json::json; // For json! macro in schema example
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// --- Request Models ---

/// Row-major augmented system `[A | b]` as sent over the wire.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_data_length"))]
#[schema(example = json!({
  "rows": 3,
  "cols": 4,
  "data": [2.0, 1.0, -1.0, 8.0, -3.0, -1.0, 2.0, -11.0, -2.0, 1.0, 2.0, -3.0],
  "workers": 2
}))]
pub struct SolveRequest {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
    /// Worker processes for the parallel engine; defaults to the server setting.
    #[validate(range(min = 1, max = 1024))]
    pub workers: Option<usize>,
}

fn validate_data_length(request: &SolveRequest) -> Result<(), ValidationError> {
    let expected = request.rows.checked_mul(request.cols);
    if expected != Some(request.data.len()) {
        let mut error = ValidationError::new("data_length");
        error.message = Some(
            format!(
                "data has {} values but rows x cols is {}x{}",
                request.data.len(),
                request.rows,
                request.cols
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

impl TryFrom<SolveRequest> for AugmentedMatrix {
    type Error = GaussCoreError;

    fn try_from(req: SolveRequest) -> Result<Self, Self::Error> {
        AugmentedMatrix::new(req.rows, req.cols, req.data)
    }
}

// --- Response Models ---

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SolveResponse {
    /// Value of unknown `i` at index `i`.
    pub values: Vec<f64>,
    pub elapsed_ms: u128,
    /// Worker processes used; zero when the sequential engine answered.
    pub workers: usize,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    /// True when the same request may succeed on retry (infrastructure failure),
    /// false when the input itself has to change.
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rows: usize, cols: usize, len: usize) -> SolveRequest {
        SolveRequest {
            rows,
            cols,
            data: vec![1.0; len],
            workers: None,
        }
    }

    #[test]
    fn test_data_length_must_match() {
        assert!(request(2, 3, 6).validate().is_ok());
        assert!(request(2, 3, 5).validate().is_err());
        assert!(request(usize::MAX, 2, 0).validate().is_err());
    }

    #[test]
    fn test_worker_range() {
        let mut req = request(2, 3, 6);
        req.workers = Some(0);
        assert!(req.validate().is_err());
        req.workers = Some(4);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_shape_errors_are_left_to_the_engine() {
        // A square matrix passes transport validation and converts fine;
        // the solver reports it as invalid input.
        let matrix = AugmentedMatrix::try_from(request(2, 2, 4)).unwrap();
        assert!(matrix.validate_system().is_err());
    }

    #[test]
    fn test_request_json() {
        let req: SolveRequest =
            serde_json::from_str(r#"{"rows":1,"cols":2,"data":[2.0,4.0]}"#).unwrap();
        assert_eq!(req.workers, None);
        let matrix = AugmentedMatrix::try_from(req).unwrap();
        assert_eq!(matrix.data(), &[2.0, 4.0]);
    }
}
