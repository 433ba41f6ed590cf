//! crates/study_spots_core/src/services/listings.rs
//!
//! CRUD and search over study-spot listings, with contributor and
//! ownership enforcement.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Amenity, ListingFields, ListingSort, Profile, StudySpot, UploadedFile};
use crate::ports::{DatabaseService, ObjectStorage, PortError, PortResult};
use crate::services::{cache_busted, store_replacing};

/// Bucket holding listing images.
pub const STUDY_SPOTS_BUCKET: &str = "study_spots";

/// Outcome of a create or update. The image upload is a non-critical side
/// effect: when it fails the listing is still saved and `image_warning`
/// carries the message to surface to the caller.
#[derive(Debug, Clone)]
pub struct SavedListing {
    pub spot: StudySpot,
    pub image_warning: Option<String>,
}

#[derive(Clone)]
pub struct ListingService {
    db: Arc<dyn DatabaseService>,
    storage: Arc<dyn ObjectStorage>,
}

impl ListingService {
    pub fn new(db: Arc<dyn DatabaseService>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, storage }
    }

    /// Searches listings. A trimmed, non-empty `query` matches name,
    /// location, or description case-insensitively; `filter` naming a known
    /// amenity restricts to that flag, anything else means "all". The two
    /// combine with logical AND.
    pub async fn list(
        &self,
        query: Option<&str>,
        filter: &str,
        sort: ListingSort,
    ) -> PortResult<Vec<StudySpot>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let amenity = Amenity::parse(filter);
        self.db.search_listings(query, amenity, sort).await
    }

    /// Listings currently flagged as trending.
    pub async fn trending(&self) -> PortResult<Vec<StudySpot>> {
        self.db
            .search_listings(None, Some(Amenity::Trending), ListingSort::Default)
            .await
    }

    pub async fn get(&self, spot_id: Uuid) -> PortResult<StudySpot> {
        self.db.get_listing(spot_id).await
    }

    /// The caller's own listings, newest first. Contributor-only.
    pub async fn for_owner(&self, owner_id: Uuid) -> PortResult<Vec<StudySpot>> {
        self.require_contributor(owner_id).await?;
        self.db.listings_by_owner(owner_id).await
    }

    /// Creates a listing owned by `owner_id`. Requires the contributor
    /// capability. The image is uploaded after the row exists (the storage
    /// path is keyed by the new id); an upload failure degrades to a
    /// warning on an otherwise successful create.
    pub async fn create(
        &self,
        owner_id: Uuid,
        fields: ListingFields,
        image: Option<UploadedFile>,
    ) -> PortResult<SavedListing> {
        self.require_contributor(owner_id).await?;

        let mut spot = self.db.insert_listing(owner_id, &fields).await?;

        let mut image_warning = None;
        if let Some(image) = image {
            let path = image_path(spot.id, &image);
            match self
                .storage
                .upload(STUDY_SPOTS_BUCKET, &path, &image.bytes, &image.content_type)
                .await
            {
                Ok(url) => {
                    let url = cache_busted(&url);
                    self.db.set_listing_image_url(spot.id, &url).await?;
                    spot.image_url = Some(url);
                }
                Err(_) => {
                    image_warning = Some("Listing created, but image upload failed.".to_string());
                }
            }
        }

        Ok(SavedListing {
            spot,
            image_warning,
        })
    }

    /// Updates a listing's fields and optionally replaces its image.
    /// Only the owner may edit; a replacement image overwrites the object
    /// at the listing's stable path, and an upload failure leaves the field
    /// update saved with a warning.
    pub async fn update(
        &self,
        spot_id: Uuid,
        caller: Uuid,
        fields: ListingFields,
        image: Option<UploadedFile>,
    ) -> PortResult<SavedListing> {
        let existing = self.db.get_listing(spot_id).await?;
        if existing.owner_id != caller {
            return Err(PortError::Forbidden(
                "You are not authorized to edit this listing.".to_string(),
            ));
        }

        let mut spot = self.db.update_listing_fields(spot_id, &fields).await?;

        let mut image_warning = None;
        if let Some(image) = image {
            let path = image_path(spot_id, &image);
            match store_replacing(self.storage.as_ref(), STUDY_SPOTS_BUCKET, &path, &image).await {
                Ok(url) => {
                    let url = cache_busted(&url);
                    self.db.set_listing_image_url(spot_id, &url).await?;
                    spot.image_url = Some(url);
                }
                Err(_) => {
                    image_warning = Some("Details updated, but image upload failed.".to_string());
                }
            }
        }

        Ok(SavedListing {
            spot,
            image_warning,
        })
    }

    /// Permanently removes a listing and, by cascade, its reviews.
    /// Only the owner may delete.
    pub async fn delete(&self, spot_id: Uuid, caller: Uuid) -> PortResult<()> {
        let existing = self.db.get_listing(spot_id).await?;
        if existing.owner_id != caller {
            return Err(PortError::Forbidden(
                "You are not authorized to delete this listing.".to_string(),
            ));
        }
        self.db.delete_listing(spot_id).await
    }

    async fn require_contributor(&self, user_id: Uuid) -> PortResult<Profile> {
        let profile = self.db.get_or_create_profile(user_id).await?;
        if !profile.is_contributor() {
            return Err(PortError::Forbidden(
                "You are not authorized to manage listings.".to_string(),
            ));
        }
        Ok(profile)
    }
}

/// Storage path for a listing's image, keyed by the listing id so a
/// replacement lands on the same object.
fn image_path(spot_id: Uuid, image: &UploadedFile) -> String {
    format!("spots/{}/main{}", spot_id, image.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDb, InMemoryStorage};

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    async fn contributor(db: &InMemoryDb, username: &str) -> Uuid {
        let user = db
            .create_user(username, &format!("{}@example.com", username), "hash")
            .await
            .unwrap();
        db.grant_contributor(user.id);
        user.id
    }

    fn setup() -> (Arc<InMemoryDb>, Arc<InMemoryStorage>, ListingService) {
        let db = Arc::new(InMemoryDb::new());
        let storage = Arc::new(InMemoryStorage::new());
        let service = ListingService::new(db.clone(), storage.clone());
        (db, storage, service)
    }

    fn fields(name: &str, location: &str, description: &str) -> ListingFields {
        ListingFields {
            name: name.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            ..ListingFields::default()
        }
    }

    #[tokio::test]
    async fn create_requires_contributor_capability() {
        let (db, _storage, service) = setup();
        let user = db
            .create_user("reader", "reader@example.com", "hash")
            .await
            .unwrap();

        let err = service
            .create(user.id, fields("Library A", "Campus", ""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Forbidden(_)));
    }

    #[tokio::test]
    async fn create_stores_image_and_cache_busted_url() {
        let (db, storage, service) = setup();
        let owner = contributor(&db, "owner").await;

        let saved = service
            .create(
                owner,
                fields("Library A", "Campus", ""),
                Some(png("front.png")),
            )
            .await
            .unwrap();

        assert!(saved.image_warning.is_none());
        let url = saved.spot.image_url.unwrap();
        assert!(url.contains(&format!("spots/{}/main.png", saved.spot.id)));
        assert!(url.contains("?v="));
        assert!(storage.contains(
            STUDY_SPOTS_BUCKET,
            &format!("spots/{}/main.png", saved.spot.id)
        ));
    }

    #[tokio::test]
    async fn image_upload_failure_degrades_to_warning() {
        let (db, storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        storage.fail_requests(true);

        let saved = service
            .create(
                owner,
                fields("Library A", "Campus", ""),
                Some(png("front.png")),
            )
            .await
            .unwrap();

        // The listing is created; only the image is missing.
        assert!(saved.image_warning.is_some());
        assert!(saved.spot.image_url.is_none());
        assert!(service.get(saved.spot.id).await.is_ok());
    }

    #[tokio::test]
    async fn update_requires_ownership() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        let other = contributor(&db, "other").await;

        let saved = service
            .create(owner, fields("Library A", "Campus", ""), None)
            .await
            .unwrap();

        let err = service
            .update(
                saved.spot.id,
                other,
                fields("Hijacked", "Elsewhere", ""),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Forbidden(_)));

        // The owner's edit goes through.
        let updated = service
            .update(
                saved.spot.id,
                owner,
                fields("Library A (renovated)", "Campus", ""),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.spot.name, "Library A (renovated)");
    }

    #[tokio::test]
    async fn update_of_missing_listing_is_not_found() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;

        let err = service
            .update(Uuid::new_v4(), owner, fields("X", "Y", ""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_requires_ownership_and_cascades_reviews() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        let reviewer = db
            .create_user("reviewer", "reviewer@example.com", "hash")
            .await
            .unwrap();

        let saved = service
            .create(owner, fields("Library A", "Campus", ""), None)
            .await
            .unwrap();
        db.insert_review(saved.spot.id, reviewer.id, 4, None)
            .await
            .unwrap();

        let err = service.delete(saved.spot.id, reviewer.id).await.unwrap_err();
        assert!(matches!(err, PortError::Forbidden(_)));

        service.delete(saved.spot.id, owner).await.unwrap();
        assert!(matches!(
            service.get(saved.spot.id).await.unwrap_err(),
            PortError::NotFound(_)
        ));
        assert!(db
            .reviews_for_listing(saved.spot.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn search_matches_substrings_and_filters_flags() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;

        // "WiFi Cafe" has the word in its name but the flag off;
        // "Study Hall" mentions wifi only in its description.
        service
            .create(owner, fields("WiFi Cafe", "Downtown", "Cozy corner"), None)
            .await
            .unwrap();
        let mut hall = fields("Study Hall", "Campus", "Quiet space with great wifi");
        hall.wifi = true;
        service.create(owner, hall, None).await.unwrap();

        let by_query = service
            .list(Some("wifi"), "all", ListingSort::Default)
            .await
            .unwrap();
        let names: Vec<_> = by_query.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["WiFi Cafe", "Study Hall"]);

        let by_flag = service
            .list(None, "wifi", ListingSort::Default)
            .await
            .unwrap();
        let names: Vec<_> = by_flag.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Study Hall"]);

        // Query and filter AND together.
        let both = service
            .list(Some("cafe"), "wifi", ListingSort::Default)
            .await
            .unwrap();
        assert!(both.is_empty());
    }

    #[tokio::test]
    async fn unknown_filter_means_all() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        service
            .create(owner, fields("Library A", "Campus", ""), None)
            .await
            .unwrap();
        service
            .create(owner, fields("Library B", "Campus", ""), None)
            .await
            .unwrap();

        let all = service
            .list(None, "no-such-filter", ListingSort::Default)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn newest_sort_reverses_insertion_order() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        service
            .create(owner, fields("First", "A", ""), None)
            .await
            .unwrap();
        service
            .create(owner, fields("Second", "B", ""), None)
            .await
            .unwrap();

        let newest = service
            .list(None, "all", ListingSort::Newest)
            .await
            .unwrap();
        let names: Vec<_> = newest.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn trending_returns_flagged_listings_only() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        service
            .create(owner, fields("Plain", "A", ""), None)
            .await
            .unwrap();
        let saved = service
            .create(owner, fields("Hot Spot", "B", ""), None)
            .await
            .unwrap();
        db.set_trending(saved.spot.id, true);

        let trending = service.trending().await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].name, "Hot Spot");
    }

    #[tokio::test]
    async fn for_owner_lists_own_spots_newest_first() {
        let (db, _storage, service) = setup();
        let owner = contributor(&db, "owner").await;
        let other = contributor(&db, "other").await;

        service
            .create(owner, fields("Mine 1", "A", ""), None)
            .await
            .unwrap();
        service
            .create(other, fields("Theirs", "B", ""), None)
            .await
            .unwrap();
        service
            .create(owner, fields("Mine 2", "C", ""), None)
            .await
            .unwrap();

        let mine = service.for_owner(owner).await.unwrap();
        let names: Vec<_> = mine.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mine 2", "Mine 1"]);
    }
}
