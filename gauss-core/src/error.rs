use std::fmt;

use thiserror::Error;

/// Stage of the solve in which a pivot was found to be too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationPhase {
    ForwardElimination,
    BackSubstitution,
}

impl fmt::Display for EliminationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EliminationPhase::ForwardElimination => write!(f, "forward elimination"),
            EliminationPhase::BackSubstitution => write!(f, "back-substitution"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GaussCoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Matrix is singular or ill-conditioned (pivot at column {column} during {phase})")]
    SingularMatrix {
        column: usize,
        phase: EliminationPhase,
    },

    #[error("Resource error: {0}")]
    ResourceError(String),

    #[error("IPC error while {context}: {source}")]
    IpcError {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker failure: {0}")]
    WorkerFailure(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl GaussCoreError {
    pub fn ipc(context: impl Into<String>, source: std::io::Error) -> Self {
        GaussCoreError::IpcError {
            context: context.into(),
            source,
        }
    }

    /// True when the caller has to fix the input, false when the failure came
    /// from the execution infrastructure and the solve may simply be retried.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            GaussCoreError::InvalidInput(_)
                | GaussCoreError::SingularMatrix { .. }
                | GaussCoreError::Parse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_classified() {
        assert!(GaussCoreError::InvalidInput("rows".into()).is_input_error());
        assert!(GaussCoreError::SingularMatrix {
            column: 2,
            phase: EliminationPhase::ForwardElimination
        }
        .is_input_error());
        assert!(!GaussCoreError::WorkerFailure("exit 1".into()).is_input_error());
        assert!(!GaussCoreError::ipc(
            "reading ack",
            std::io::Error::from(std::io::ErrorKind::UnexpectedEof)
        )
        .is_input_error());
    }

    #[test]
    fn test_singular_message_names_column() {
        let err = GaussCoreError::SingularMatrix {
            column: 3,
            phase: EliminationPhase::BackSubstitution,
        };
        assert_eq!(
            err.to_string(),
            "Matrix is singular or ill-conditioned (pivot at column 3 during back-substitution)"
        );
    }
}
