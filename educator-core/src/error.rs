//! Error types for the educator core.

use std::{error::Error, fmt, io};

/// Error type for educator core operations.
#[derive(Debug)]
pub enum EducatorError {
    /// The backend could not be reached after every permitted attempt.
    BackendUnreachable {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the last transport failure.
        message: String,
    },
    /// The backend answered with a non-success status.
    BackendRejected {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The backend replied successfully but the payload was unusable.
    MalformedResponse(String),
    /// The structural analyzer rejected the input.
    AnalysisFailed(String),
    /// An underlying I/O error.
    Io(io::Error),
    /// File contents were not valid UTF-8.
    Encoding(String),
    /// A caller supplied an invalid value.
    InvalidInput(String),
}

impl EducatorError {
    /// Whether the failure came from the backend rather than local input.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::BackendUnreachable { .. } | Self::BackendRejected { .. } | Self::MalformedResponse(_)
        )
    }
}

impl fmt::Display for EducatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnreachable { attempts, message } => write!(
                f,
                "backend unreachable after {attempts} attempt(s): {message}"
            ),
            Self::BackendRejected { status, body } if body.is_empty() => {
                write!(f, "backend rejected request with status {status}")
            }
            Self::BackendRejected { status, body } => {
                write!(f, "backend rejected request with status {status}: {body}")
            }
            Self::MalformedResponse(message) => write!(f, "malformed backend response: {message}"),
            Self::AnalysisFailed(message) => write!(f, "analysis failed: {message}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Encoding(message) => write!(f, "encoding error: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl Error for EducatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for EducatorError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Convenience result type for the educator core.
pub type Result<T> = std::result::Result<T, EducatorError>;

#[cfg(test)]
mod tests {
    use super::EducatorError;
    use std::io;

    #[test]
    fn io_error_formats_message() {
        let error = EducatorError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(format!("{error}"), "io error: boom");
    }

    #[test]
    fn unreachable_error_reports_attempts() {
        let error = EducatorError::BackendUnreachable {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            format!("{error}"),
            "backend unreachable after 3 attempt(s): connection refused"
        );
    }

    #[test]
    fn rejected_error_omits_empty_body() {
        let error = EducatorError::BackendRejected {
            status: 500,
            body: String::new(),
        };
        assert_eq!(format!("{error}"), "backend rejected request with status 500");

        let error = EducatorError::BackendRejected {
            status: 404,
            body: "model not found".to_string(),
        };
        assert!(format!("{error}").ends_with(": model not found"));
    }

    #[test]
    fn from_io_error_maps_variant() {
        let error: EducatorError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        match error {
            EducatorError::Io(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn backend_errors_are_flagged() {
        assert!(EducatorError::MalformedResponse("x".to_string()).is_backend());
        assert!(!EducatorError::InvalidInput("x".to_string()).is_backend());
        assert!(!EducatorError::AnalysisFailed("x".to_string()).is_backend());
    }
}
