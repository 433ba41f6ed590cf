//! crates/study_spots_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Per-user profile, created lazily on first access.
///
/// `is_contributor` is the capability flag gating every listing-management
/// operation.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub middle_initial: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_contributor: bool,
}

impl Profile {
    /// Whether this profile may create, edit, or delete listings.
    pub fn is_contributor(&self) -> bool {
        self.is_contributor
    }
}

/// A study-location listing, owned by exactly one user.
///
/// `average_rating` is derived: it always equals the mean of the listing's
/// review ratings rounded to 2 decimals, or 0.00 with no reviews.
#[derive(Debug, Clone)]
pub struct StudySpot {
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
    pub created_at: DateTime<Utc>,
}

/// The mutable fields of a listing, as submitted on create or edit.
#[derive(Debug, Clone, Default)]
pub struct ListingFields {
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
}

/// An amenity filter applied to a listing search. Unknown filter strings
/// parse to `None`, which callers treat as "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amenity {
    Wifi,
    Ac,
    Outlets,
    Coffee,
    Pastries,
    Open24,
    Trending,
}

impl Amenity {
    pub fn parse(filter: &str) -> Option<Self> {
        match filter {
            "wifi" => Some(Self::Wifi),
            "ac" => Some(Self::Ac),
            "outlets" => Some(Self::Outlets),
            "coffee" => Some(Self::Coffee),
            "pastries" => Some(Self::Pastries),
            "open24" => Some(Self::Open24),
            "trending" => Some(Self::Trending),
            _ => None,
        }
    }

    /// Reads the matching boolean flag off a listing.
    pub fn is_set(&self, spot: &StudySpot) -> bool {
        match self {
            Self::Wifi => spot.wifi,
            Self::Ac => spot.ac,
            Self::Outlets => spot.outlets,
            Self::Coffee => spot.coffee,
            Self::Pastries => spot.pastries,
            Self::Open24 => spot.open_24_7,
            Self::Trending => spot.is_trending,
        }
    }
}

/// Result ordering for listing searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingSort {
    /// Insertion order.
    #[default]
    Default,
    /// Most recently created first.
    Newest,
}

/// A rating left by one user on one listing. At most one review may exist
/// per (listing, user) pair; reviews are immutable once created.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: Uuid,
    pub spot_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inclusive rating bounds for a review.
pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Computes the aggregate rating for a set of review ratings: the
/// arithmetic mean rounded to 2 decimals, or 0.00 with no reviews.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let mean = ratings.iter().copied().sum::<i32>() as f64 / ratings.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Status of a staff application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Approved" => Some(Self::Approved),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A contributor/staff application. One row per user, overwritten on
/// resubmission; status transitions happen in an external approval process.
#[derive(Debug, Clone)]
pub struct StaffApplication {
    pub user_id: Uuid,
    pub full_name: String,
    pub business_name: String,
    pub business_address: String,
    pub phone_number: Option<String>,
    pub government_id_url: Option<String>,
    pub proof_of_ownership_url: Option<String>,
    pub proof_of_address_url: Option<String>,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
}

/// The applicant-supplied fields of a staff application.
#[derive(Debug, Clone, Default)]
pub struct StaffApplicationFields {
    pub full_name: String,
    pub business_name: String,
    pub business_address: String,
    pub phone_number: Option<String>,
}

/// The three supporting-document slots on a staff application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    GovernmentId,
    ProofOfOwnership,
    ProofOfAddress,
}

impl DocumentKind {
    /// Field name, used to namespace the storage path of the document.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::GovernmentId => "government_id",
            Self::ProofOfOwnership => "proof_of_ownership",
            Self::ProofOfAddress => "proof_of_address",
        }
    }
}

/// Raw bytes of a file received from a client, headed for object storage.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// The file extension including the leading dot, defaulting to ".jpg"
    /// when the client sent a bare name.
    pub fn extension(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{}", ext),
            _ => ".jpg".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_no_ratings_is_zero() {
        assert_eq!(average_rating(&[]), 0.0);
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        assert_eq!(average_rating(&[4, 5]), 4.5);
        assert_eq!(average_rating(&[4, 5, 3]), 4.0);
        // 1 + 2 + 5 = 8 / 3 = 2.666... -> 2.67
        assert_eq!(average_rating(&[1, 2, 5]), 2.67);
        assert_eq!(average_rating(&[2, 2, 5]), 3.0);
    }

    #[test]
    fn amenity_parse_known_and_unknown() {
        assert_eq!(Amenity::parse("wifi"), Some(Amenity::Wifi));
        assert_eq!(Amenity::parse("open24"), Some(Amenity::Open24));
        assert_eq!(Amenity::parse("trending"), Some(Amenity::Trending));
        // Unknown filter values are treated as "all".
        assert_eq!(Amenity::parse("all"), None);
        assert_eq!(Amenity::parse("parking"), None);
        assert_eq!(Amenity::parse(""), None);
    }

    #[test]
    fn uploaded_file_extension() {
        let file = |name: &str| UploadedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![],
        };
        assert_eq!(file("photo.png").extension(), ".png");
        assert_eq!(file("archive.tar.gz").extension(), ".gz");
        assert_eq!(file("noext").extension(), ".jpg");
        assert_eq!(file(".hidden").extension(), ".jpg");
    }
}
