//! crates/study_spots_core/src/services/mod.rs
//!
//! The application services: the orchestration logic between the web layer
//! and the ports. Each service owns an injected handle to the ports it
//! needs; nothing in here touches a database or the network directly.

pub mod listings;
pub mod profiles;
pub mod reviews;
pub mod staff;

pub use listings::{ListingService, SavedListing, STUDY_SPOTS_BUCKET};
pub use profiles::{
    AvatarAction, ProfileService, ProfileUpdate, AVATARS_BUCKET, AVATAR_PLACEHOLDER_URL,
};
pub use reviews::ReviewService;
pub use staff::{StaffApplicationService, STAFF_DOCS_BUCKET};

use chrono::Utc;

use crate::domain::UploadedFile;
use crate::ports::{ObjectStorage, PortResult};

/// Stores a file at a stable path, overwriting any previous object.
/// Tries an update first and falls back to upload if the object doesn't
/// exist yet.
pub(crate) async fn store_replacing(
    storage: &dyn ObjectStorage,
    bucket: &str,
    path: &str,
    file: &UploadedFile,
) -> PortResult<String> {
    match storage
        .update(bucket, path, &file.bytes, &file.content_type)
        .await
    {
        Ok(url) => Ok(url),
        Err(_) => {
            storage
                .upload(bucket, path, &file.bytes, &file.content_type)
                .await
        }
    }
}

/// Appends a cache-busting query parameter so browsers pick up an asset
/// overwritten at the same path.
pub(crate) fn cache_busted(url: &str) -> String {
    let url = url.strip_suffix('?').unwrap_or(url);
    format!("{}?v={}", url, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::cache_busted;

    #[test]
    fn cache_buster_appends_version_param() {
        let busted = cache_busted("https://storage.test/avatars/users/1/avatar_final.png");
        assert!(busted.starts_with("https://storage.test/avatars/users/1/avatar_final.png?v="));
    }

    #[test]
    fn cache_buster_strips_trailing_question_mark() {
        let busted = cache_busted("https://storage.test/a/b?");
        assert!(busted.starts_with("https://storage.test/a/b?v="));
        assert_eq!(busted.matches('?').count(), 1);
    }
}
