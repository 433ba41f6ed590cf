//! services/api/src/web/profile.rs
//!
//! Profile viewing and management, including the avatar upload and the
//! live username-availability check used by the manage page.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_spots_core::domain::{Profile, UploadedFile, User};
use study_spots_core::services::{AvatarAction, ProfileUpdate};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::error_response;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: Option<String>,
    pub middle_initial: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_contributor: bool,
}

impl ProfileResponse {
    fn new(user: User, profile: Profile) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            full_name: profile.full_name,
            middle_initial: profile.middle_initial,
            phone_number: profile.phone_number,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            is_contributor: profile.is_contributor,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UsernameCheckRequest {
    pub username: String,
}

#[derive(Serialize, ToSchema)]
pub struct UsernameCheckResponse {
    pub is_available: bool,
    pub message: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /profile - The caller's identity and profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (user, profile) = state.profiles.view(user_id).await.map_err(error_response)?;
    Ok(Json(ProfileResponse::new(user, profile)))
}

/// PUT /profile - Update the caller's identity and profile.
///
/// Accepts a multipart/form-data request. The avatar can be replaced by
/// sending an `avatar` file part, or reset to the placeholder by sending
/// `avatar_removed=true`.
#[utoipa::path(
    put,
    path = "/profile",
    request_body(content_type = "multipart/form-data", description = "Profile fields plus optional avatar"),
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Not logged in"),
        (status = 409, description = "Username already taken"),
        (status = 502, description = "Avatar upload failed")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut update = ProfileUpdate {
        first_name: String::new(),
        last_name: String::new(),
        username: String::new(),
        email: String::new(),
        middle_initial: None,
        phone_number: None,
        bio: None,
    };
    let mut avatar_file: Option<UploadedFile> = None;
    let mut avatar_removed = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "avatar" {
            let file_name = field.file_name().unwrap_or("avatar.jpg").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read avatar bytes: {}", e),
                )
            })?;
            if !data.is_empty() {
                avatar_file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read field '{}': {}", name, e),
            )
        })?;
        match name.as_str() {
            "first_name" => update.first_name = value,
            "last_name" => update.last_name = value,
            "username" => update.username = value,
            "email" => update.email = value,
            "middle_initial" => update.middle_initial = Some(value),
            "phone_number" => update.phone_number = Some(value),
            "bio" => update.bio = Some(value),
            "avatar_removed" => avatar_removed = value == "true",
            _ => {}
        }
    }

    // Removal wins over a stray file part, matching the manage form.
    let avatar = if avatar_removed {
        AvatarAction::Remove
    } else if let Some(file) = avatar_file {
        AvatarAction::Replace(file)
    } else {
        AvatarAction::Keep
    };

    let (user, profile) = state
        .profiles
        .update(user_id, update, avatar)
        .await
        .map_err(error_response)?;

    Ok(Json(ProfileResponse::new(user, profile)))
}

/// POST /profile/username-check - Live username-availability probe.
#[utoipa::path(
    post,
    path = "/profile/username-check",
    request_body = UsernameCheckRequest,
    responses(
        (status = 200, description = "Availability verdict", body = UsernameCheckResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn username_check_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UsernameCheckRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (is_available, message) = state
        .profiles
        .username_available(user_id, &req.username)
        .await
        .map_err(error_response)?;
    Ok(Json(UsernameCheckResponse {
        is_available,
        message,
    }))
}
