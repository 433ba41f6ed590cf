pub mod auth;
pub mod listings;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod reviews;
pub mod staff;
pub mod state;

use axum::http::StatusCode;
use study_spots_core::ports::PortError;
use tracing::error;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_auth;

/// Maps a core error onto the HTTP status it surfaces as. Validation and
/// authorization failures carry their message to the caller; unexpected
/// failures are logged here and returned opaque.
pub(crate) fn error_response(err: PortError) -> (StatusCode, String) {
    let status = match &err {
        PortError::Unauthenticated => StatusCode::UNAUTHORIZED,
        PortError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Storage(_) => StatusCode::BAD_GATEWAY,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Internal error: {:?}", err);
        return (status, "An unexpected internal error occurred".to_string());
    }
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(
            error_response(PortError::Unauthenticated).0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_response(PortError::Forbidden("no".into())).0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_response(PortError::Validation("bad".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(PortError::NotFound("gone".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(PortError::Conflict("dup".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(PortError::Storage("down".into())).0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn unexpected_errors_are_returned_opaque() {
        let (status, message) = error_response(PortError::Unexpected("pg blew up".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("pg blew up"));
    }
}
