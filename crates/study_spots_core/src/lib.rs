pub mod domain;
pub mod ports;
pub mod services;
pub mod testing;

pub use domain::{
    average_rating, Amenity, ApplicationStatus, AuthSession, DocumentKind, ListingFields,
    ListingSort, Profile, Review, StaffApplication, StaffApplicationFields, StudySpot,
    UploadedFile, User, UserCredentials, MAX_RATING, MIN_RATING,
};
pub use ports::{DatabaseService, ObjectStorage, PortError, PortResult};
pub use services::{
    AvatarAction, ListingService, ProfileService, ProfileUpdate, ReviewService, SavedListing,
    StaffApplicationService, AVATARS_BUCKET, AVATAR_PLACEHOLDER_URL, STAFF_DOCS_BUCKET,
    STUDY_SPOTS_BUCKET,
};
