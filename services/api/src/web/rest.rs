//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, aggregating the
//! paths and schemas declared next to each handler.

use utoipa::OpenApi;

use crate::web::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::web::listings::{ListingDetailResponse, ListingResponse, SavedListingResponse};
use crate::web::profile::{ProfileResponse, UsernameCheckRequest, UsernameCheckResponse};
use crate::web::reviews::{ReviewResponse, SubmitReviewRequest};
use crate::web::staff::StaffApplicationResponse;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::listings::list_listings_handler,
        crate::web::listings::trending_listings_handler,
        crate::web::listings::my_listings_handler,
        crate::web::listings::listing_detail_handler,
        crate::web::listings::create_listing_handler,
        crate::web::listings::update_listing_handler,
        crate::web::listings::delete_listing_handler,
        crate::web::reviews::submit_review_handler,
        crate::web::profile::get_profile_handler,
        crate::web::profile::update_profile_handler,
        crate::web::profile::username_check_handler,
        crate::web::staff::get_staff_application_handler,
        crate::web::staff::submit_staff_application_handler,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            ListingResponse,
            SavedListingResponse,
            ListingDetailResponse,
            SubmitReviewRequest,
            ReviewResponse,
            ProfileResponse,
            UsernameCheckRequest,
            UsernameCheckResponse,
            StaffApplicationResponse,
        )
    ),
    tags(
        (name = "Study Spots API", description = "API endpoints for the study spot directory.")
    )
)]
pub struct ApiDoc;
