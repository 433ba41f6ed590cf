//! services/api/src/web/staff.rs
//!
//! The staff-application endpoints: submit (or resubmit) an application
//! with supporting documents, and fetch the caller's current one.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use study_spots_core::domain::{
    DocumentKind, StaffApplication, StaffApplicationFields, UploadedFile,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::error_response;
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StaffApplicationResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub business_name: String,
    pub business_address: String,
    pub phone_number: Option<String>,
    pub government_id_url: Option<String>,
    pub proof_of_ownership_url: Option<String>,
    pub proof_of_address_url: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<StaffApplication> for StaffApplicationResponse {
    fn from(app: StaffApplication) -> Self {
        Self {
            user_id: app.user_id,
            full_name: app.full_name,
            business_name: app.business_name,
            business_address: app.business_address,
            phone_number: app.phone_number,
            government_id_url: app.government_id_url,
            proof_of_ownership_url: app.proof_of_ownership_url,
            proof_of_address_url: app.proof_of_address_url,
            status: app.status.as_str().to_string(),
            submitted_at: app.submitted_at,
        }
    }
}

fn document_kind(field_name: &str) -> Option<DocumentKind> {
    match field_name {
        "government_id" => Some(DocumentKind::GovernmentId),
        "proof_of_ownership" => Some(DocumentKind::ProofOfOwnership),
        "proof_of_address" => Some(DocumentKind::ProofOfAddress),
        _ => None,
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /staff-application - The caller's application, if any.
#[utoipa::path(
    get,
    path = "/staff-application",
    responses(
        (status = 200, description = "The caller's application", body = StaffApplicationResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No application on file")
    )
)]
pub async fn get_staff_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let application = state.staff.for_user(user_id).await.map_err(error_response)?;
    match application {
        Some(app) => Ok(Json(StaffApplicationResponse::from(app))),
        None => Err((
            StatusCode::NOT_FOUND,
            "No staff application on file".to_string(),
        )),
    }
}

/// POST /staff-application - Submit or resubmit an application.
///
/// Accepts a multipart/form-data request with the applicant fields and up
/// to three document file parts (government_id, proof_of_ownership,
/// proof_of_address). Document uploads are all-or-nothing: any storage
/// failure aborts the submission.
#[utoipa::path(
    post,
    path = "/staff-application",
    request_body(content_type = "multipart/form-data", description = "Applicant fields plus supporting documents"),
    responses(
        (status = 201, description = "Application submitted", body = StaffApplicationResponse),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Not logged in"),
        (status = 502, description = "Document upload failed")
    )
)]
pub async fn submit_staff_application_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut fields = StaffApplicationFields::default();
    let mut documents: Vec<(DocumentKind, UploadedFile)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(kind) = document_kind(&name) {
            let file_name = field
                .file_name()
                .unwrap_or("document.pdf")
                .to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read document bytes: {}", e),
                )
            })?;
            if !data.is_empty() {
                documents.push((
                    kind,
                    UploadedFile {
                        file_name,
                        content_type,
                        bytes: data.to_vec(),
                    },
                ));
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
            "full_name" => fields.full_name = value,
            "business_name" => fields.business_name = value,
            "business_address" => fields.business_address = value,
            "phone_number" => {
                if !value.trim().is_empty() {
                    fields.phone_number = Some(value);
                }
            }
            _ => {}
        }
    }

    let application = state
        .staff
        .submit(user_id, fields, documents)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(StaffApplicationResponse::from(application)),
    ))
}
