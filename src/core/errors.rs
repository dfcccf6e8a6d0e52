use axum::http::StatusCode;
use serde::Serialize;

/// Stable, caller-visible classification of every gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RemoteUnavailable,
    RemoteNotFound,
    RemoteWriteFailed,
    RemoteOperationFailed,
    SubmissionRejected,
    InvalidTask,
    InvalidRequest,
    UploadFailed,
    LaunchFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::RemoteNotFound => "remote_not_found",
            ErrorKind::RemoteWriteFailed => "remote_write_failed",
            ErrorKind::RemoteOperationFailed => "remote_operation_failed",
            ErrorKind::SubmissionRejected => "submission_rejected",
            ErrorKind::InvalidTask => "invalid_task",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::LaunchFailed => "launch_failed",
        }
    }

    /// Whether repeating the same request unchanged may succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RemoteUnavailable
                | ErrorKind::RemoteWriteFailed
                | ErrorKind::RemoteOperationFailed
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidTask | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::RemoteNotFound => StatusCode::NOT_FOUND,
            ErrorKind::RemoteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::RemoteWriteFailed
            | ErrorKind::RemoteOperationFailed
            | ErrorKind::SubmissionRejected
            | ErrorKind::UploadFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::LaunchFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("remote path not found: {0}")]
    RemoteNotFound(String),
    #[error("remote write failed: {0}")]
    RemoteWriteFailed(String),
    #[error("remote operation failed: {0}")]
    RemoteOperationFailed(String),
    #[error("job submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("invalid task: {0}")]
    InvalidTask(String),
    /// Caller input rejected before any remote was contacted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// `cause` is the kind of the remote failure behind this upload, if any.
    #[error("upload failed: {detail}")]
    UploadFailed {
        detail: String,
        cause: Option<ErrorKind>,
    },
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::RemoteUnavailable(_) | GatewayError::Unexpected(_) => {
                ErrorKind::RemoteUnavailable
            }
            GatewayError::RemoteNotFound(_) => ErrorKind::RemoteNotFound,
            GatewayError::RemoteWriteFailed(_) => ErrorKind::RemoteWriteFailed,
            GatewayError::RemoteOperationFailed(_) => ErrorKind::RemoteOperationFailed,
            GatewayError::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            GatewayError::InvalidTask(_) => ErrorKind::InvalidTask,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::UploadFailed { .. } => ErrorKind::UploadFailed,
            GatewayError::LaunchFailed(_) => ErrorKind::LaunchFailed,
        }
    }

    pub fn cause_kind(&self) -> Option<ErrorKind> {
        match self {
            GatewayError::UploadFailed { cause, .. } => *cause,
            _ => None,
        }
    }

    pub fn upload_failed(detail: impl Into<String>) -> Self {
        GatewayError::UploadFailed {
            detail: detail.into(),
            cause: None,
        }
    }

    /// Wraps a store failure raised while relaying an upload.
    pub fn from_remote_upload(err: GatewayError) -> Self {
        match err {
            GatewayError::UploadFailed { .. } => err,
            other => GatewayError::UploadFailed {
                cause: Some(other.kind()),
                detail: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::RemoteUnavailable(format!("request timed out: {err}"))
        } else {
            GatewayError::RemoteUnavailable(err.to_string())
        }
    }
}
