use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of one query execution against the upstream engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream rejected credentials ({status}): {detail}")]
    Auth { status: u16, detail: String },

    #[error("Upstream error{}: {}", .status.map(|s| format!(" ({})", s)).unwrap_or_default(), .detail)]
    Upstream { status: Option<u16>, detail: String },

    #[error("Query timed out after {:.1}s", .elapsed.as_secs_f64())]
    Timeout { elapsed: Duration },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::Transport(_) => ErrorKind::Transport,
            ExecutionError::Auth { .. } => ErrorKind::Auth,
            ExecutionError::Upstream { .. } => ErrorKind::Upstream,
            ExecutionError::Timeout { .. } => ErrorKind::Timeout,
            ExecutionError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Classify a non-2xx upstream HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => ExecutionError::Auth {
                status,
                detail: body.into(),
            },
            _ => ExecutionError::Upstream {
                status: Some(status),
                detail: body.into(),
            },
        }
    }
}

/// Stable classification of an [`ExecutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Auth,
    Upstream,
    Timeout,
    MalformedResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport_error",
            ErrorKind::Auth => "auth_error",
            ErrorKind::Upstream => "upstream_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid inbound request parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing 'dql'")]
    EmptyQuery,

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            ExecutionError::Transport("refused".into()).kind().as_str(),
            "transport_error"
        );
        assert_eq!(
            ExecutionError::Timeout {
                elapsed: Duration::from_secs(2)
            }
            .kind()
            .to_string(),
            "timeout"
        );
        assert_eq!(
            ExecutionError::MalformedResponse("no jobId".into()).kind(),
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            ExecutionError::from_status(401, "bad token").kind(),
            ErrorKind::Auth
        );
        assert_eq!(ExecutionError::from_status(403, "").kind(), ErrorKind::Auth);

        match ExecutionError::from_status(500, "boom") {
            ExecutionError::Upstream { status, detail } => {
                assert_eq!(status, Some(500));
                assert_eq!(detail, "boom");
            }
            other => panic!("Expected Upstream, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let err = ExecutionError::Upstream {
            status: Some(502),
            detail: "gateway".into(),
        };
        assert_eq!(err.to_string(), "Upstream error (502): gateway");

        let err = ExecutionError::Upstream {
            status: None,
            detail: "query failed".into(),
        };
        assert_eq!(err.to_string(), "Upstream error: query failed");
    }
}
