//! services/api/src/web/listings.rs
//!
//! Axum handlers for listing search, detail, and the contributor-only
//! management endpoints. Create and update accept multipart forms so the
//! listing image can ride along with the fields.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_spots_core::domain::{ListingFields, ListingSort, StudySpot, UploadedFile};
use study_spots_core::services::SavedListing;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::error_response;
use crate::web::reviews::ReviewResponse;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize)]
pub struct ListingSearchParams {
    pub q: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ListingResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: String,
    pub description: String,
    pub wifi: bool,
    pub ac: bool,
    pub free: bool,
    pub coffee: bool,
    pub open_24_7: bool,
    pub outlets: bool,
    pub pastries: bool,
    pub is_trending: bool,
    pub average_rating: f64,
    pub image_url: Option<String>,
}

impl From<StudySpot> for ListingResponse {
    fn from(spot: StudySpot) -> Self {
        Self {
            id: spot.id,
            owner_id: spot.owner_id,
            name: spot.name,
            location: spot.location,
            description: spot.description,
            wifi: spot.wifi,
            ac: spot.ac,
            free: spot.free,
            coffee: spot.coffee,
            open_24_7: spot.open_24_7,
            outlets: spot.outlets,
            pastries: spot.pastries,
            is_trending: spot.is_trending,
            average_rating: spot.average_rating,
            image_url: spot.image_url,
        }
    }
}

/// Response to a create or edit. `warning` is set when the listing saved
/// but its image could not be stored.
#[derive(Serialize, ToSchema)]
pub struct SavedListingResponse {
    pub listing: ListingResponse,
    pub warning: Option<String>,
}

impl From<SavedListing> for SavedListingResponse {
    fn from(saved: SavedListing) -> Self {
        Self {
            listing: saved.spot.into(),
            warning: saved.image_warning,
        }
    }
}

/// Detail payload: the listing plus its reviews, newest first.
#[derive(Serialize, ToSchema)]
pub struct ListingDetailResponse {
    pub listing: ListingResponse,
    pub reviews: Vec<ReviewResponse>,
}

//=========================================================================================
// Multipart Form Parsing
//=========================================================================================

fn checkbox(value: &str) -> bool {
    matches!(value, "on" | "true" | "1")
}

fn multipart_err(e: axum::extract::multipart::MultipartError) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        format!("Failed to read multipart data: {}", e),
    )
}

/// Pulls the listing fields and the optional image out of a multipart
/// form. Checkbox fields arrive as "on" when ticked.
async fn parse_listing_form(
    mut multipart: Multipart,
) -> Result<(ListingFields, Option<UploadedFile>), (StatusCode, String)> {
    let mut fields = ListingFields::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let file_name = field.file_name().unwrap_or("image.jpg").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(multipart_err)?;
            if !data.is_empty() {
                image = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(multipart_err)?;
        match name.as_str() {
            "name" => fields.name = value,
            "location" => fields.location = value,
            "description" => fields.description = value,
            "wifi" => fields.wifi = checkbox(&value),
            "ac" => fields.ac = checkbox(&value),
            "free" => fields.free = checkbox(&value),
            "coffee" => fields.coffee = checkbox(&value),
            "open_24_7" => fields.open_24_7 = checkbox(&value),
            "outlets" => fields.outlets = checkbox(&value),
            "pastries" => fields.pastries = checkbox(&value),
            _ => {}
        }
    }

    if fields.name.trim().is_empty() || fields.location.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Name and location are required".to_string(),
        ));
    }

    Ok((fields, image))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /listings - Search listings.
///
/// `q` matches name, location, or description case-insensitively; `filter`
/// names an amenity (wifi|ac|outlets|coffee|pastries|open24|trending),
/// anything else means "all"; `sort=recent` orders newest first.
#[utoipa::path(
    get,
    path = "/listings",
    params(
        ("q" = Option<String>, Query, description = "Substring to search for"),
        ("filter" = Option<String>, Query, description = "Amenity filter, or 'all'"),
        ("sort" = Option<String>, Query, description = "'recent' for newest first")
    ),
    responses(
        (status = 200, description = "Matching listings", body = [ListingResponse])
    )
)]
pub async fn list_listings_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingSearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sort = match params.sort.as_deref() {
        Some("recent") => ListingSort::Newest,
        _ => ListingSort::Default,
    };
    let spots = state
        .listings
        .list(
            params.q.as_deref(),
            params.filter.as_deref().unwrap_or("all"),
            sort,
        )
        .await
        .map_err(error_response)?;

    let listings: Vec<ListingResponse> = spots.into_iter().map(Into::into).collect();
    Ok(Json(listings))
}

/// GET /listings/trending - Listings currently flagged as trending.
#[utoipa::path(
    get,
    path = "/listings/trending",
    responses(
        (status = 200, description = "Trending listings", body = [ListingResponse])
    )
)]
pub async fn trending_listings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let spots = state.listings.trending().await.map_err(error_response)?;
    let listings: Vec<ListingResponse> = spots.into_iter().map(Into::into).collect();
    Ok(Json(listings))
}

/// GET /listings/mine - The caller's own listings, newest first.
#[utoipa::path(
    get,
    path = "/listings/mine",
    responses(
        (status = 200, description = "The caller's listings", body = [ListingResponse]),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller is not a contributor")
    )
)]
pub async fn my_listings_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let spots = state
        .listings
        .for_owner(user_id)
        .await
        .map_err(error_response)?;
    let listings: Vec<ListingResponse> = spots.into_iter().map(Into::into).collect();
    Ok(Json(listings))
}

/// GET /listings/{spot_id} - Listing detail with its reviews.
#[utoipa::path(
    get,
    path = "/listings/{spot_id}",
    params(("spot_id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "The listing and its reviews", body = ListingDetailResponse),
        (status = 404, description = "No such listing")
    )
)]
pub async fn listing_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(spot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let spot = state.listings.get(spot_id).await.map_err(error_response)?;
    let reviews = state
        .reviews
        .for_listing(spot_id)
        .await
        .map_err(error_response)?;

    Ok(Json(ListingDetailResponse {
        listing: spot.into(),
        reviews: reviews.into_iter().map(Into::into).collect(),
    }))
}

/// POST /listings - Create a listing (contributors only).
///
/// Accepts a multipart/form-data request with the listing fields and an
/// optional `image` file part. An image upload failure does not fail the
/// create; the response carries a warning instead.
#[utoipa::path(
    post,
    path = "/listings",
    request_body(content_type = "multipart/form-data", description = "Listing fields plus optional image"),
    responses(
        (status = 201, description = "Listing created", body = SavedListingResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller is not a contributor")
    )
)]
pub async fn create_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (fields, image) = parse_listing_form(multipart).await?;

    let saved = state
        .listings
        .create(user_id, fields, image)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(SavedListingResponse::from(saved))))
}

/// PUT /listings/{spot_id} - Edit a listing (owner only).
#[utoipa::path(
    put,
    path = "/listings/{spot_id}",
    params(("spot_id" = Uuid, Path, description = "Listing id")),
    request_body(content_type = "multipart/form-data", description = "Listing fields plus optional replacement image"),
    responses(
        (status = 200, description = "Listing updated", body = SavedListingResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller does not own the listing"),
        (status = 404, description = "No such listing")
    )
)]
pub async fn update_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(spot_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (fields, image) = parse_listing_form(multipart).await?;

    let saved = state
        .listings
        .update(spot_id, user_id, fields, image)
        .await
        .map_err(error_response)?;

    Ok(Json(SavedListingResponse::from(saved)))
}

/// DELETE /listings/{spot_id} - Delete a listing (owner only).
#[utoipa::path(
    delete,
    path = "/listings/{spot_id}",
    params(("spot_id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Listing deleted"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller does not own the listing"),
        (status = 404, description = "No such listing")
    )
)]
pub async fn delete_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(spot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .listings
        .delete(spot_id, user_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::checkbox;

    #[test]
    fn checkbox_accepts_form_truthy_values() {
        assert!(checkbox("on"));
        assert!(checkbox("true"));
        assert!(checkbox("1"));
        assert!(!checkbox("off"));
        assert!(!checkbox(""));
    }
}
