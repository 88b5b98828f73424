use bookscout_db::DbError;
use bookscout_http::error::AppError;
use thiserror::Error;

/// Failures of the books module.
#[derive(Error, Debug)]
pub enum BookError {
    /// The query or its parameters cannot form a valid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The search API answered with a non-200 status
    #[error("search API responded with status {status}")]
    UpstreamError { status: u16 },

    /// The search API body did not match the expected schema
    #[error("could not decode search response: {0}")]
    DecodingError(String),

    /// No response at all: connect failure, timeout, reset
    #[error("search API unreachable: {0}")]
    Transport(String),

    #[error("'{title}' is already on the saved list")]
    DuplicateEntry { title: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl BookError {
    /// Stable machine-readable code, used in events and HTTP bodies
    pub fn code(&self) -> &'static str {
        match self {
            BookError::InvalidRequest(_) => "invalid_request",
            BookError::UpstreamError { .. } => "upstream_error",
            BookError::DecodingError(_) => "decoding_error",
            BookError::Transport(_) => "transport_error",
            BookError::DuplicateEntry { .. } => "duplicate_entry",
            BookError::NotFound(_) => "not_found",
            BookError::Storage(_) => "storage_error",
        }
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let code = err.code();
        match err {
            BookError::InvalidRequest(_) => AppError::bad_request(code, err.to_string()),
            BookError::UpstreamError { .. }
            | BookError::DecodingError(_)
            | BookError::Transport(_) => AppError::bad_gateway(code, err.to_string()),
            BookError::DuplicateEntry { ref title } => AppError::conflict(
                code,
                vec![serde_json::json!({ "title": title })],
                err.to_string(),
            ),
            BookError::NotFound(_) => AppError::not_found(code, err.to_string()),
            BookError::Storage(db) => AppError::Internal(anyhow::Error::new(db)),
        }
    }
}
