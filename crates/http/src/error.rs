use axum::http::StatusCode;

use meridian_core::MemoryError;

/// Maps the internal error taxonomy onto HTTP status codes for the handful
/// of error paths that surface before a tool body runs (auth, dispatch).
/// Errors raised inside a tool body are never turned into HTTP error
/// responses directly — [`meridian_boundary::ToolResponse`] already carries
/// them as a `200 OK` with `success: false`, matching what operators polling
/// a tool endpoint expect.
pub fn status_for(error: &MemoryError) -> StatusCode {
    match error {
        MemoryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        MemoryError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        MemoryError::NotFound(_) => StatusCode::NOT_FOUND,
        MemoryError::Validation(_)
        | MemoryError::MissingAction(_)
        | MemoryError::InvalidAction(_)
        | MemoryError::InvalidActionType(_) => StatusCode::BAD_REQUEST,
        MemoryError::Conflict(_) => StatusCode::CONFLICT,
        MemoryError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        MemoryError::ServiceUnavailable(_) | MemoryError::CircuitBreakerOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
