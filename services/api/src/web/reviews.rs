//! services/api/src/web/reviews.rs
//!
//! Review submission. The route is public: the handler resolves the
//! session itself so an anonymous caller gets the service's
//! authentication error rather than being bounced by the middleware.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_spots_core::domain::Review;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::error_response;
use crate::web::middleware::session_user;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SubmitReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub spot_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            spot_id: review.spot_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /listings/{spot_id}/reviews - Leave a review on a listing.
///
/// One review per user per listing; the rating must be an integer in
/// [1,5]. The listing's average rating is recomputed before the response
/// is sent.
#[utoipa::path(
    post,
    path = "/listings/{spot_id}/reviews",
    params(("spot_id" = Uuid, Path, description = "Listing id")),
    request_body = SubmitReviewRequest,
    responses(
        (status = 201, description = "Review submitted", body = ReviewResponse),
        (status = 400, description = "Rating out of range"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No such listing"),
        (status = 409, description = "Caller already reviewed this listing")
    )
)]
pub async fn submit_review_handler(
    State(state): State<Arc<AppState>>,
    Path(spot_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let caller = session_user(&state, &headers).await;

    let review = state
        .reviews
        .submit(spot_id, caller, req.rating, req.comment)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ReviewResponse::from(review))))
}
