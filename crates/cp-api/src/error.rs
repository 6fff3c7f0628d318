//! HTTP mapping for the engine error taxonomy.
//!
//! Validation errors are 400, conflicts 409 (with a retryable hint for the
//! one conflict that is safe to retry), invariant violations 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use cp_core::error::EngineError;

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidThreshold(_)
            | EngineError::InvalidReviewScope(_)
            | EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(..) => StatusCode::NOT_FOUND,
            EngineError::DuplicateFlag { .. }
            | EngineError::AlreadyReviewed { .. }
            | EngineError::ConcurrentModification(_) => StatusCode::CONFLICT,
            EngineError::TrustScoreOutOfRange { .. } | EngineError::Internal(_) => {
                error!(err = %self.0, "internal engine failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(e: EngineError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(status_of(EngineError::InvalidThreshold(1.5)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(EngineError::AlreadyReviewed { flag_id: Uuid::nil() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::ConcurrentModification("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::NotFound("user", "u".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EngineError::Unauthorized("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(EngineError::TrustScoreOutOfRange {
                user_id: Uuid::nil(),
                score: 120.0
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
