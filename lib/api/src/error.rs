use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use tracing::error;

/// Errors returned by the REST handlers
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Movie '{0}' not found in database. Try searching for similar titles.")]
    MovieNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Engine(#[from] cinesim_core::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MovieNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(cinesim_core::Error::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(json!({
            "error": self.to_string()
        }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
