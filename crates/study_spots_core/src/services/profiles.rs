//! crates/study_spots_core/src/services/profiles.rs
//!
//! Profile viewing and management, including avatar storage and the
//! username-availability probe.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Profile, UploadedFile, User};
use crate::ports::{DatabaseService, ObjectStorage, PortError, PortResult};
use crate::services::{cache_busted, store_replacing};

/// Bucket holding user avatars.
pub const AVATARS_BUCKET: &str = "avatars";

/// Static placeholder an avatar resets to on removal.
pub const AVATAR_PLACEHOLDER_URL: &str = "/static/imgs/avatar_placeholder.jpg";

/// What to do with the avatar during a profile update.
#[derive(Debug, Clone)]
pub enum AvatarAction {
    Keep,
    Remove,
    Replace(UploadedFile),
}

/// The editable identity and profile fields, as submitted from the manage
/// page. Empty optional fields clear the stored value.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub middle_initial: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn ObjectStorage>,
}

impl ProfileService {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, storage }
    }

    /// The user's identity plus their profile, creating the profile lazily
    /// on first access.
    pub async fn view(&self, user_id: Uuid) -> PortResult<(User, Profile)> {
        let user = self.db.get_user(user_id).await?;
        let profile = self.db.get_or_create_profile(user_id).await?;
        Ok((user, profile))
    }

    /// Applies a profile update.
    ///
    /// A replacement avatar is stored before anything is written, so a
    /// storage failure aborts the update with both the user row and the
    /// profile untouched. A username collision surfaces as `Conflict`.
    pub async fn update(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
        avatar: AvatarAction,
    ) -> PortResult<(User, Profile)> {
        let first_name = update.first_name.trim();
        let last_name = update.last_name.trim();
        let username = update.username.trim();
        let email = update.email.trim();
        if first_name.is_empty() || last_name.is_empty() || username.is_empty() || email.is_empty()
        {
            return Err(PortError::Validation(
                "First name, last name, username, and email are required.".to_string(),
            ));
        }

        let new_avatar_url = match &avatar {
            AvatarAction::Keep => None,
            AvatarAction::Remove => Some(AVATAR_PLACEHOLDER_URL.to_string()),
            AvatarAction::Replace(file) => {
                let path = format!("users/{}/avatar_final{}", user_id, file.extension());
                let url = store_replacing(self.storage.as_ref(), AVATARS_BUCKET, &path, file)
                    .await?;
                Some(cache_busted(&url))
            }
        };

        let user = self
            .db
            .update_user_identity(user_id, first_name, last_name, username, email)
            .await?;

        let mut profile = self.db.get_or_create_profile(user_id).await?;
        let middle_initial = normalized(update.middle_initial);
        profile.phone_number = normalized(update.phone_number);
        profile.bio = normalized(update.bio);
        profile.full_name = Some(compose_full_name(
            first_name,
            middle_initial.as_deref(),
            last_name,
        ));
        profile.middle_initial = middle_initial;
        if let Some(url) = new_avatar_url {
            profile.avatar_url = Some(url);
        }

        let profile = self.db.save_profile(&profile).await?;
        Ok((user, profile))
    }

    /// Availability probe backing the live username check on the manage
    /// page. Empty or unchanged candidates are available by definition;
    /// everything else is a case-insensitive existence check.
    pub async fn username_available(
        &self,
        user_id: Uuid,
        candidate: &str,
    ) -> PortResult<(bool, String)> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok((true, String::new()));
        }

        let current = self.db.get_user(user_id).await?;
        if candidate == current.username {
            return Ok((true, "Username is the same.".to_string()));
        }

        if self.db.username_taken(candidate).await? {
            Ok((false, "Username already taken.".to_string()))
        } else {
            Ok((true, "Username is available.".to_string()))
        }
    }
}

fn normalized(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn compose_full_name(first: &str, middle_initial: Option<&str>, last: &str) -> String {
    [Some(first), middle_initial, Some(last)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDb, InMemoryStorage};

    fn update() -> ProfileUpdate {
        ProfileUpdate {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            middle_initial: Some("K".to_string()),
            phone_number: Some("555-0101".to_string()),
            bio: Some("Night owl.".to_string()),
        }
    }

    async fn setup() -> (Arc<InMemoryDb>, Arc<InMemoryStorage>, ProfileService, Uuid) {
        let db = Arc::new(InMemoryDb::new());
        let storage = Arc::new(InMemoryStorage::new());
        let service = ProfileService::new(db.clone(), storage.clone());
        let user = db
            .create_user("ada", "ada@example.com", "hash")
            .await
            .unwrap()
            .id;
        (db, storage, service, user)
    }

    #[tokio::test]
    async fn view_creates_the_profile_lazily() {
        let (_db, _storage, service, user) = setup().await;
        let (u, profile) = service.view(user).await.unwrap();
        assert_eq!(u.username, "ada");
        assert!(!profile.is_contributor());
        assert!(profile.full_name.is_none());
    }

    #[tokio::test]
    async fn update_composes_full_name_and_saves_fields() {
        let (_db, _storage, service, user) = setup().await;
        let (_u, profile) = service.update(user, update(), AvatarAction::Keep).await.unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada K Lovelace"));
        assert_eq!(profile.phone_number.as_deref(), Some("555-0101"));

        // Without a middle initial the name has no gap.
        let mut no_mi = update();
        no_mi.middle_initial = None;
        let (_u, profile) = service.update(user, no_mi, AvatarAction::Keep).await.unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.middle_initial, None);
    }

    #[tokio::test]
    async fn update_requires_identity_fields() {
        let (_db, _storage, service, user) = setup().await;
        let mut missing = update();
        missing.email = "   ".to_string();
        let err = service
            .update(user, missing, AvatarAction::Keep)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn replacing_avatar_stores_cache_busted_url() {
        let (_db, storage, service, user) = setup().await;
        let file = UploadedFile {
            file_name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1],
        };
        let (_u, profile) = service
            .update(user, update(), AvatarAction::Replace(file))
            .await
            .unwrap();
        let url = profile.avatar_url.unwrap();
        assert!(url.contains(&format!("users/{}/avatar_final.png", user)));
        assert!(url.contains("?v="));
        assert!(storage.contains(AVATARS_BUCKET, &format!("users/{}/avatar_final.png", user)));
    }

    #[tokio::test]
    async fn avatar_upload_failure_aborts_the_update() {
        let (db, storage, service, user) = setup().await;
        storage.fail_requests(true);

        let mut renamed = update();
        renamed.username = "ada_l".to_string();
        let file = UploadedFile {
            file_name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1],
        };
        let err = service
            .update(user, renamed, AvatarAction::Replace(file))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));

        // Nothing was written, including the username change.
        assert_eq!(db.get_user(user).await.unwrap().username, "ada");
    }

    #[tokio::test]
    async fn removing_avatar_resets_to_placeholder() {
        let (_db, _storage, service, user) = setup().await;
        let (_u, profile) = service
            .update(user, update(), AvatarAction::Remove)
            .await
            .unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some(AVATAR_PLACEHOLDER_URL));
    }

    #[tokio::test]
    async fn username_collision_is_a_conflict() {
        let (db, _storage, service, user) = setup().await;
        db.create_user("grace", "grace@example.com", "hash")
            .await
            .unwrap();

        let mut taken = update();
        taken.username = "grace".to_string();
        let err = service
            .update(user, taken, AvatarAction::Keep)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn username_availability_rules() {
        let (db, _storage, service, user) = setup().await;
        db.create_user("grace", "grace@example.com", "hash")
            .await
            .unwrap();

        // Empty and unchanged are always available.
        assert!(service.username_available(user, "").await.unwrap().0);
        assert!(service.username_available(user, "ada").await.unwrap().0);

        // Taken names are checked case-insensitively.
        assert!(!service.username_available(user, "grace").await.unwrap().0);
        assert!(!service.username_available(user, "GRACE").await.unwrap().0);

        assert!(service.username_available(user, "ada_l").await.unwrap().0);
    }
}
