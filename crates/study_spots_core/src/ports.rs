//! crates/study_spots_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Amenity, ListingFields, ListingSort, Profile, Review, StaffApplication, StudySpot, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and service operations.
/// This abstracts away the specific errors from external services (e.g., database, network)
/// and carries the full error taxonomy the web layer maps onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Not authorized: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage service error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    /// Case-insensitive existence probe for the username-availability check.
    async fn username_taken(&self, username: &str) -> PortResult<bool>;

    /// Updates the identity fields on a user row. A username collision
    /// surfaces as `PortError::Conflict`.
    async fn update_user_identity(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
        email: &str,
    ) -> PortResult<User>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Profile Management ---
    /// Fetches the user's profile, creating an empty one if absent.
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn save_profile(&self, profile: &Profile) -> PortResult<Profile>;

    // --- Listing Management ---
    /// Search with optional case-insensitive substring query over
    /// name/location/description (OR semantics) and an optional amenity
    /// flag restriction. Query and amenity combine with logical AND.
    async fn search_listings(
        &self,
        query: Option<&str>,
        amenity: Option<Amenity>,
        sort: ListingSort,
    ) -> PortResult<Vec<StudySpot>>;

    async fn get_listing(&self, spot_id: Uuid) -> PortResult<StudySpot>;

    /// The owner's listings, newest id first.
    async fn listings_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<StudySpot>>;

    async fn insert_listing(&self, owner_id: Uuid, fields: &ListingFields)
        -> PortResult<StudySpot>;

    async fn update_listing_fields(
        &self,
        spot_id: Uuid,
        fields: &ListingFields,
    ) -> PortResult<StudySpot>;

    async fn set_listing_image_url(&self, spot_id: Uuid, image_url: &str) -> PortResult<()>;

    /// Removes the listing; its reviews cascade away with it.
    async fn delete_listing(&self, spot_id: Uuid) -> PortResult<()>;

    // --- Review Management ---
    /// Inserts a review and recomputes the parent listing's average rating
    /// in the same transaction, so no reader observes one without the
    /// other. A second review for the same (listing, user) pair fails with
    /// `PortError::Conflict`, enforced by the persistence layer's
    /// uniqueness constraint rather than a check-then-insert.
    async fn insert_review(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> PortResult<Review>;

    /// The listing's reviews, newest first.
    async fn reviews_for_listing(&self, spot_id: Uuid) -> PortResult<Vec<Review>>;

    /// Recomputes and persists the listing's average rating from its
    /// current reviews. Exposed standalone for recovery; the normal path
    /// runs inside `insert_review`.
    async fn recompute_average_rating(&self, spot_id: Uuid) -> PortResult<f64>;

    // --- Staff Applications ---
    /// Creates or overwrites the single application row for the user.
    async fn upsert_staff_application(
        &self,
        application: &StaffApplication,
    ) -> PortResult<StaffApplication>;

    async fn staff_application_for_user(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<StaffApplication>>;
}

/// Contract for the external object store (bucket-per-asset-type).
///
/// URLs returned from `upload`/`update` are the public URLs of the stored
/// object; callers append a cache-busting query parameter when overwriting
/// an asset at a stable path.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores a new object and returns its public URL. Fails if an object
    /// already exists at the path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> PortResult<String>;

    /// Overwrites an existing object and returns its public URL.
    async fn update(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> PortResult<String>;

    /// The public URL an object at `path` would be served from.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
