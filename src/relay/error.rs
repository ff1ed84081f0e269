use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::error::Error as StdError;
use thiserror::Error;

/// Terminal failures of a single relay request.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing url parameter")]
    MissingUrl,

    #[error("Target not allowed")]
    TargetNotAllowed,

    /// The origin answered with a non-success status.
    #[error("Failed to fetch remote audio")]
    Upstream(StatusCode),

    #[error("Invalid headers parameter: {0}")]
    InvalidHeaders(#[from] serde_json::Error),

    #[error("Invalid headers parameter: expected a JSON object")]
    HeadersNotObject,

    #[error("Proxy error: {}", error_chain(.0))]
    Fetch(#[from] reqwest::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl => StatusCode::BAD_REQUEST,
            RelayError::TargetNotAllowed => StatusCode::FORBIDDEN,
            RelayError::Upstream(status) => *status,
            RelayError::InvalidHeaders(_)
            | RelayError::HeadersNotObject
            | RelayError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

// reqwest's Display stops at the outermost error; the cause (DNS, refused,
// timed out) lives further down the source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
