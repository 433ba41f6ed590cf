//! crates/study_spots_core/src/services/staff.rs
//!
//! The staff-application workflow: a single, overwritable application row
//! per user, carrying up to three supporting documents held in object
//! storage.

use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    ApplicationStatus, DocumentKind, StaffApplication, StaffApplicationFields, UploadedFile,
};
use crate::ports::{DatabaseService, ObjectStorage, PortError, PortResult};
use crate::services::store_replacing;

/// Bucket holding staff-application documents.
pub const STAFF_DOCS_BUCKET: &str = "staff_docs";

#[derive(Clone)]
pub struct StaffApplicationService {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn ObjectStorage>,
}

impl StaffApplicationService {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, storage }
    }

    /// Creates or overwrites the caller's application.
    ///
    /// Documents are the critical side effect here, so the handling is
    /// atomic-fail: every supplied document is uploaded before the row is
    /// touched, and any storage failure aborts the submission with nothing
    /// written. Document kinds not resubmitted keep the URLs from the
    /// previous submission. The status resets to Pending on every
    /// submission, discarding a prior Approved/Rejected outcome.
    pub async fn submit(
        &self,
        user_id: Uuid,
        fields: StaffApplicationFields,
        documents: Vec<(DocumentKind, UploadedFile)>,
    ) -> PortResult<StaffApplication> {
        if fields.full_name.trim().is_empty()
            || fields.business_name.trim().is_empty()
            || fields.business_address.trim().is_empty()
        {
            return Err(PortError::Validation(
                "Full name, business name, and business address are required.".to_string(),
            ));
        }

        let existing = self.db.staff_application_for_user(user_id).await?;

        let mut uploaded: Vec<(DocumentKind, String)> = Vec::new();
        for (kind, file) in &documents {
            let path = format!("{}/{}", kind.field_name(), file.file_name);
            let url = store_replacing(self.storage.as_ref(), STAFF_DOCS_BUCKET, &path, file).await?;
            uploaded.push((*kind, url));
        }

        let mut application = StaffApplication {
            user_id,
            full_name: fields.full_name,
            business_name: fields.business_name,
            business_address: fields.business_address,
            phone_number: fields.phone_number,
            government_id_url: existing
                .as_ref()
                .and_then(|a| a.government_id_url.clone()),
            proof_of_ownership_url: existing
                .as_ref()
                .and_then(|a| a.proof_of_ownership_url.clone()),
            proof_of_address_url: existing
                .as_ref()
                .and_then(|a| a.proof_of_address_url.clone()),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
        };
        for (kind, url) in uploaded {
            match kind {
                DocumentKind::GovernmentId => application.government_id_url = Some(url),
                DocumentKind::ProofOfOwnership => application.proof_of_ownership_url = Some(url),
                DocumentKind::ProofOfAddress => application.proof_of_address_url = Some(url),
            }
        }

        self.db.upsert_staff_application(&application).await
    }

    pub async fn for_user(&self, user_id: Uuid) -> PortResult<Option<StaffApplication>> {
        self.db.staff_application_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDb, InMemoryStorage};

    fn doc(kind: DocumentKind, name: &str) -> (DocumentKind, UploadedFile) {
        (
            kind,
            UploadedFile {
                file_name: name.to_string(),
                content_type: "application/pdf".to_string(),
                bytes: vec![9, 9, 9],
            },
        )
    }

    fn fields() -> StaffApplicationFields {
        StaffApplicationFields {
            full_name: "Jo Applicant".to_string(),
            business_name: "Corner Cafe".to_string(),
            business_address: "1 Main St".to_string(),
            phone_number: Some("555-0100".to_string()),
        }
    }

    async fn setup() -> (Arc<InMemoryDb>, Arc<InMemoryStorage>, StaffApplicationService, Uuid) {
        let db = Arc::new(InMemoryDb::new());
        let storage = Arc::new(InMemoryStorage::new());
        let service = StaffApplicationService::new(db.clone(), storage.clone());
        let applicant = db
            .create_user("applicant", "applicant@example.com", "hash")
            .await
            .unwrap()
            .id;
        (db, storage, service, applicant)
    }

    #[tokio::test]
    async fn submission_uploads_documents_and_stores_urls() {
        let (_db, storage, service, applicant) = setup().await;

        let app = service
            .submit(
                applicant,
                fields(),
                vec![
                    doc(DocumentKind::GovernmentId, "id.pdf"),
                    doc(DocumentKind::ProofOfAddress, "lease.pdf"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(app
            .government_id_url
            .as_deref()
            .unwrap()
            .contains("government_id/id.pdf"));
        assert!(app
            .proof_of_address_url
            .as_deref()
            .unwrap()
            .contains("proof_of_address/lease.pdf"));
        assert!(app.proof_of_ownership_url.is_none());
        assert!(storage.contains(STAFF_DOCS_BUCKET, "government_id/id.pdf"));
    }

    #[tokio::test]
    async fn resubmission_overwrites_the_single_row() {
        let (_db, _storage, service, applicant) = setup().await;

        service
            .submit(
                applicant,
                fields(),
                vec![doc(DocumentKind::GovernmentId, "id.pdf")],
            )
            .await
            .unwrap();

        let mut updated_fields = fields();
        updated_fields.business_name = "Corner Cafe LLC".to_string();
        service
            .submit(applicant, updated_fields, vec![])
            .await
            .unwrap();

        let app = service.for_user(applicant).await.unwrap().unwrap();
        assert_eq!(app.business_name, "Corner Cafe LLC");
        // One row per user, and the previously uploaded document survives
        // a resubmission that doesn't include it.
        assert!(app.government_id_url.is_some());
    }

    #[tokio::test]
    async fn resubmission_resets_status_to_pending() {
        let (db, _storage, service, applicant) = setup().await;

        service.submit(applicant, fields(), vec![]).await.unwrap();
        db.set_application_status(applicant, ApplicationStatus::Approved);

        service.submit(applicant, fields(), vec![]).await.unwrap();
        let app = service.for_user(applicant).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn document_upload_failure_aborts_the_whole_submission() {
        let (_db, storage, service, applicant) = setup().await;
        storage.fail_requests(true);

        let err = service
            .submit(
                applicant,
                fields(),
                vec![doc(DocumentKind::GovernmentId, "id.pdf")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));

        // Nothing was written.
        assert!(service.for_user(applicant).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected() {
        let (_db, _storage, service, applicant) = setup().await;

        let mut incomplete = fields();
        incomplete.business_name = "  ".to_string();
        let err = service
            .submit(applicant, incomplete, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn for_user_is_empty_before_first_submission() {
        let (_db, _storage, service, applicant) = setup().await;
        assert!(service.for_user(applicant).await.unwrap().is_none());
    }
}
