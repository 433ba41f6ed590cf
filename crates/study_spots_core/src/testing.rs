//! crates/study_spots_core/src/testing.rs
//!
//! In-memory implementations of the persistence and storage ports, used to
//! exercise the services without Postgres or a storage backend. The
//! database double mirrors the real adapter's observable semantics: the
//! review uniqueness constraint, cascade deletion, case-insensitive
//! search, and the average-rating recomputation on review insert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    average_rating, Amenity, ApplicationStatus, ListingFields, ListingSort, Profile, Review,
    StaffApplication, StudySpot, User, UserCredentials,
};
use crate::ports::{DatabaseService, ObjectStorage, PortError, PortResult};

//=========================================================================================
// In-Memory Database
//=========================================================================================

struct UserRecord {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct DbState {
    users: Vec<UserRecord>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, Profile>,
    spots: Vec<StudySpot>,
    reviews: Vec<Review>,
    applications: HashMap<Uuid, StaffApplication>,
}

#[derive(Default)]
pub struct InMemoryDb {
    state: Mutex<DbState>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the contributor capability on, creating the profile if needed.
    pub fn grant_contributor(&self, user_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .entry(user_id)
            .or_insert_with(|| empty_profile(user_id));
        profile.is_contributor = true;
    }

    pub fn set_trending(&self, spot_id: Uuid, trending: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(spot) = state.spots.iter_mut().find(|s| s.id == spot_id) {
            spot.is_trending = trending;
        }
    }

    /// Overwrites a persisted average so tests can watch it get repaired.
    pub fn corrupt_average(&self, spot_id: Uuid, value: f64) {
        let mut state = self.state.lock().unwrap();
        if let Some(spot) = state.spots.iter_mut().find(|s| s.id == spot_id) {
            spot.average_rating = value;
        }
    }

    /// Simulates the external approval process moving an application out of
    /// Pending.
    pub fn set_application_status(&self, user_id: Uuid, status: ApplicationStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(app) = state.applications.get_mut(&user_id) {
            app.status = status;
        }
    }
}

fn empty_profile(user_id: Uuid) -> Profile {
    Profile {
        user_id,
        full_name: None,
        middle_initial: None,
        phone_number: None,
        bio: None,
        avatar_url: None,
        is_contributor: false,
    }
}

fn recompute_average_locked(state: &mut DbState, spot_id: Uuid) -> PortResult<f64> {
    let ratings: Vec<i32> = state
        .reviews
        .iter()
        .filter(|r| r.spot_id == spot_id)
        .map(|r| r.rating)
        .collect();
    let average = average_rating(&ratings);
    let spot = state
        .spots
        .iter_mut()
        .find(|s| s.id == spot_id)
        .ok_or_else(|| PortError::NotFound(format!("Listing {} not found", spot_id)))?;
    spot.average_rating = average;
    Ok(average)
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        if state
            .users
            .iter()
            .any(|r| r.user.username.eq_ignore_ascii_case(username))
        {
            return Err(PortError::Conflict(format!(
                "Username {} is already taken",
                username
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            created_at: Utc::now(),
        };
        state.users.push(UserRecord {
            user: user.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.state.lock().unwrap();
        state
            .users
            .iter()
            .find(|r| r.user.id == user_id)
            .map(|r| r.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let state = self.state.lock().unwrap();
        state
            .users
            .iter()
            .find(|r| r.user.username == username)
            .map(|r| UserCredentials {
                user_id: r.user.id,
                username: r.user.username.clone(),
                hashed_password: r.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))
    }

    async fn username_taken(&self, username: &str) -> PortResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .any(|r| r.user.username.eq_ignore_ascii_case(username)))
    }

    async fn update_user_identity(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
        email: &str,
    ) -> PortResult<User> {
        let mut state = self.state.lock().unwrap();
        if state
            .users
            .iter()
            .any(|r| r.user.id != user_id && r.user.username.eq_ignore_ascii_case(username))
        {
            return Err(PortError::Conflict(format!(
                "Username {} is already taken",
                username
            )));
        }
        let record = state
            .users
            .iter_mut()
            .find(|r| r.user.id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        record.user.first_name = first_name.to_string();
        record.user.last_name = last_name.to_string();
        record.user.username = username.to_string();
        record.user.email = email.to_string();
        Ok(record.user.clone())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let state = self.state.lock().unwrap();
        match state.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthenticated),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .profiles
            .entry(user_id)
            .or_insert_with(|| empty_profile(user_id))
            .clone())
    }

    async fn save_profile(&self, profile: &Profile) -> PortResult<Profile> {
        let mut state = self.state.lock().unwrap();
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn search_listings(
        &self,
        query: Option<&str>,
        amenity: Option<Amenity>,
        sort: ListingSort,
    ) -> PortResult<Vec<StudySpot>> {
        let state = self.state.lock().unwrap();
        let query = query.map(str::to_lowercase);
        let mut results: Vec<StudySpot> = state
            .spots
            .iter()
            .filter(|spot| match &query {
                Some(q) => {
                    spot.name.to_lowercase().contains(q)
                        || spot.location.to_lowercase().contains(q)
                        || spot.description.to_lowercase().contains(q)
                }
                None => true,
            })
            .filter(|spot| match amenity {
                Some(flag) => flag.is_set(spot),
                None => true,
            })
            .cloned()
            .collect();
        if sort == ListingSort::Newest {
            results.reverse();
        }
        Ok(results)
    }

    async fn get_listing(&self, spot_id: Uuid) -> PortResult<StudySpot> {
        let state = self.state.lock().unwrap();
        state
            .spots
            .iter()
            .find(|s| s.id == spot_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Listing {} not found", spot_id)))
    }

    async fn listings_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<StudySpot>> {
        let state = self.state.lock().unwrap();
        let mut spots: Vec<StudySpot> = state
            .spots
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        spots.reverse();
        Ok(spots)
    }

    async fn insert_listing(
        &self,
        owner_id: Uuid,
        fields: &ListingFields,
    ) -> PortResult<StudySpot> {
        let mut state = self.state.lock().unwrap();
        let spot = StudySpot {
            id: Uuid::new_v4(),
            owner_id,
            name: fields.name.clone(),
            location: fields.location.clone(),
            description: fields.description.clone(),
            wifi: fields.wifi,
            ac: fields.ac,
            free: fields.free,
            coffee: fields.coffee,
            open_24_7: fields.open_24_7,
            outlets: fields.outlets,
            pastries: fields.pastries,
            is_trending: false,
            average_rating: 0.0,
            image_url: None,
            created_at: Utc::now(),
        };
        state.spots.push(spot.clone());
        Ok(spot)
    }

    async fn update_listing_fields(
        &self,
        spot_id: Uuid,
        fields: &ListingFields,
    ) -> PortResult<StudySpot> {
        let mut state = self.state.lock().unwrap();
        let spot = state
            .spots
            .iter_mut()
            .find(|s| s.id == spot_id)
            .ok_or_else(|| PortError::NotFound(format!("Listing {} not found", spot_id)))?;
        spot.name = fields.name.clone();
        spot.location = fields.location.clone();
        spot.description = fields.description.clone();
        spot.wifi = fields.wifi;
        spot.ac = fields.ac;
        spot.free = fields.free;
        spot.coffee = fields.coffee;
        spot.open_24_7 = fields.open_24_7;
        spot.outlets = fields.outlets;
        spot.pastries = fields.pastries;
        Ok(spot.clone())
    }

    async fn set_listing_image_url(&self, spot_id: Uuid, image_url: &str) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let spot = state
            .spots
            .iter_mut()
            .find(|s| s.id == spot_id)
            .ok_or_else(|| PortError::NotFound(format!("Listing {} not found", spot_id)))?;
        spot.image_url = Some(image_url.to_string());
        Ok(())
    }

    async fn delete_listing(&self, spot_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.spots.len();
        state.spots.retain(|s| s.id != spot_id);
        if state.spots.len() == before {
            return Err(PortError::NotFound(format!("Listing {} not found", spot_id)));
        }
        // Cascade, as the foreign key would.
        state.reviews.retain(|r| r.spot_id != spot_id);
        Ok(())
    }

    async fn insert_review(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> PortResult<Review> {
        // One lock for the insert and the recomputation, mirroring the
        // adapter's transaction.
        let mut state = self.state.lock().unwrap();
        if !state.spots.iter().any(|s| s.id == spot_id) {
            return Err(PortError::NotFound(format!("Listing {} not found", spot_id)));
        }
        if state
            .reviews
            .iter()
            .any(|r| r.spot_id == spot_id && r.user_id == user_id)
        {
            return Err(PortError::Conflict(
                "You have already submitted a review for this spot.".to_string(),
            ));
        }
        let review = Review {
            id: Uuid::new_v4(),
            spot_id,
            user_id,
            rating,
            comment: comment.map(str::to_string),
            created_at: Utc::now(),
        };
        state.reviews.push(review.clone());
        recompute_average_locked(&mut state, spot_id)?;
        Ok(review)
    }

    async fn reviews_for_listing(&self, spot_id: Uuid) -> PortResult<Vec<Review>> {
        let state = self.state.lock().unwrap();
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.spot_id == spot_id)
            .cloned()
            .collect();
        reviews.reverse();
        Ok(reviews)
    }

    async fn recompute_average_rating(&self, spot_id: Uuid) -> PortResult<f64> {
        let mut state = self.state.lock().unwrap();
        recompute_average_locked(&mut state, spot_id)
    }

    async fn upsert_staff_application(
        &self,
        application: &StaffApplication,
    ) -> PortResult<StaffApplication> {
        let mut state = self.state.lock().unwrap();
        state
            .applications
            .insert(application.user_id, application.clone());
        Ok(application.clone())
    }

    async fn staff_application_for_user(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<StaffApplication>> {
        let state = self.state.lock().unwrap();
        Ok(state.applications.get(&user_id).cloned())
    }
}

//=========================================================================================
// In-Memory Object Storage
//=========================================================================================

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upload/update fail, simulating an
    /// unreachable storage collaborator.
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&object_key(bucket, path))
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket, path)
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> PortResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Storage("storage backend unavailable".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        let key = object_key(bucket, path);
        if objects.contains_key(&key) {
            return Err(PortError::Storage(format!(
                "object already exists at {}",
                key
            )));
        }
        objects.insert(key, bytes.to_vec());
        Ok(self.public_url(bucket, path))
    }

    async fn update(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> PortResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Storage("storage backend unavailable".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        let key = object_key(bucket, path);
        if !objects.contains_key(&key) {
            return Err(PortError::Storage(format!("no object at {}", key)));
        }
        objects.insert(key, bytes.to_vec());
        Ok(self.public_url(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{}/{}", bucket, path)
    }
}
