//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_spots_core::domain::{
    Amenity, ApplicationStatus, ListingFields, ListingSort, Profile, Review, StaffApplication,
    StudySpot, User, UserCredentials,
};
use study_spots_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Error Mapping Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a unique-constraint violation to `Conflict`, everything else to
/// `Unexpected`.
fn write_err(e: sqlx::Error, conflict_message: &str) -> PortError {
    let is_unique = e
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if is_unique {
        PortError::Conflict(conflict_message.to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

/// Escapes LIKE/ILIKE pattern metacharacters in a user-supplied search term.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn amenity_column(amenity: Amenity) -> &'static str {
    match amenity {
        Amenity::Wifi => "wifi",
        Amenity::Ac => "ac",
        Amenity::Outlets => "outlets",
        Amenity::Coffee => "coffee",
        Amenity::Pastries => "pastries",
        Amenity::Open24 => "open_24_7",
        Amenity::Trending => "is_trending",
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    username: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            username: self.username,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    full_name: Option<String>,
    middle_initial: Option<String>,
    phone_number: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    is_contributor: bool,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            full_name: self.full_name,
            middle_initial: self.middle_initial,
            phone_number: self.phone_number,
            bio: self.bio,
            avatar_url: self.avatar_url,
            is_contributor: self.is_contributor,
        }
    }
}

#[derive(FromRow)]
struct SpotRecord {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    location: String,
    description: String,
    wifi: bool,
    ac: bool,
    free: bool,
    coffee: bool,
    open_24_7: bool,
    outlets: bool,
    pastries: bool,
    is_trending: bool,
    average_rating: f64,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}
impl SpotRecord {
    fn to_domain(self) -> StudySpot {
        StudySpot {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            location: self.location,
            description: self.description,
            wifi: self.wifi,
            ac: self.ac,
            free: self.free,
            coffee: self.coffee,
            open_24_7: self.open_24_7,
            outlets: self.outlets,
            pastries: self.pastries,
            is_trending: self.is_trending,
            average_rating: self.average_rating,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReviewRecord {
    id: Uuid,
    spot_id: Uuid,
    user_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}
impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            spot_id: self.spot_id,
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct StaffApplicationRecord {
    user_id: Uuid,
    full_name: String,
    business_name: String,
    business_address: String,
    phone_number: Option<String>,
    government_id_url: Option<String>,
    proof_of_ownership_url: Option<String>,
    proof_of_address_url: Option<String>,
    status: String,
    submitted_at: DateTime<Utc>,
}
impl StaffApplicationRecord {
    fn to_domain(self) -> PortResult<StaffApplication> {
        let status = ApplicationStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown application status '{}'", self.status))
        })?;
        Ok(StaffApplication {
            user_id: self.user_id,
            full_name: self.full_name,
            business_name: self.business_name,
            business_address: self.business_address,
            phone_number: self.phone_number,
            government_id_url: self.government_id_url,
            proof_of_ownership_url: self.proof_of_ownership_url,
            proof_of_address_url: self.proof_of_address_url,
            status,
            submitted_at: self.submitted_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, email, hashed_password)
             VALUES ($1, $2, $3)
             RETURNING id, username, email, first_name, last_name, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_err(e, "Username is already taken"))?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, email, first_name, last_name, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", username))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn username_taken(&self, username: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn update_user_identity(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
        email: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users
             SET first_name = $1, last_name = $2, username = $3, email = $4
             WHERE id = $5
             RETURNING id, username, email, first_name, last_name, created_at",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .bind(email)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => write_err(e, "Username is already taken"),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthenticated,
            _ => unexpected(e),
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, full_name, middle_initial, phone_number, bio, avatar_url, is_contributor
             FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn save_profile(&self, profile: &Profile) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "INSERT INTO user_profiles
                 (user_id, full_name, middle_initial, phone_number, bio, avatar_url, is_contributor)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                 full_name = EXCLUDED.full_name,
                 middle_initial = EXCLUDED.middle_initial,
                 phone_number = EXCLUDED.phone_number,
                 bio = EXCLUDED.bio,
                 avatar_url = EXCLUDED.avatar_url,
                 is_contributor = EXCLUDED.is_contributor
             RETURNING user_id, full_name, middle_initial, phone_number, bio, avatar_url, is_contributor",
        )
        .bind(profile.user_id)
        .bind(&profile.full_name)
        .bind(&profile.middle_initial)
        .bind(&profile.phone_number)
        .bind(&profile.bio)
        .bind(&profile.avatar_url)
        .bind(profile.is_contributor)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn search_listings(
        &self,
        query: Option<&str>,
        amenity: Option<Amenity>,
        sort: ListingSort,
    ) -> PortResult<Vec<StudySpot>> {
        let mut sql = String::from(
            "SELECT id, owner_id, name, location, description, wifi, ac, free, coffee,
                    open_24_7, outlets, pastries, is_trending, average_rating, image_url, created_at
             FROM study_spots WHERE TRUE",
        );
        if query.is_some() {
            sql.push_str(" AND (name ILIKE $1 OR location ILIKE $1 OR description ILIKE $1)");
        }
        if let Some(flag) = amenity {
            sql.push_str(" AND ");
            sql.push_str(amenity_column(flag));
            sql.push_str(" = TRUE");
        }
        sql.push_str(match sort {
            ListingSort::Default => " ORDER BY created_at ASC",
            ListingSort::Newest => " ORDER BY created_at DESC",
        });

        let mut stmt = sqlx::query_as::<_, SpotRecord>(&sql);
        if let Some(term) = query {
            stmt = stmt.bind(format!("%{}%", escape_like(term)));
        }

        let records = stmt.fetch_all(&self.pool).await.map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_listing(&self, spot_id: Uuid) -> PortResult<StudySpot> {
        let record = sqlx::query_as::<_, SpotRecord>(
            "SELECT id, owner_id, name, location, description, wifi, ac, free, coffee,
                    open_24_7, outlets, pastries, is_trending, average_rating, image_url, created_at
             FROM study_spots WHERE id = $1",
        )
        .bind(spot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Listing {} not found", spot_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn listings_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<StudySpot>> {
        let records = sqlx::query_as::<_, SpotRecord>(
            "SELECT id, owner_id, name, location, description, wifi, ac, free, coffee,
                    open_24_7, outlets, pastries, is_trending, average_rating, image_url, created_at
             FROM study_spots WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_listing(
        &self,
        owner_id: Uuid,
        fields: &ListingFields,
    ) -> PortResult<StudySpot> {
        let record = sqlx::query_as::<_, SpotRecord>(
            "INSERT INTO study_spots
                 (owner_id, name, location, description, wifi, ac, free, coffee,
                  open_24_7, outlets, pastries)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id, owner_id, name, location, description, wifi, ac, free, coffee,
                       open_24_7, outlets, pastries, is_trending, average_rating, image_url, created_at",
        )
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(&fields.description)
        .bind(fields.wifi)
        .bind(fields.ac)
        .bind(fields.free)
        .bind(fields.coffee)
        .bind(fields.open_24_7)
        .bind(fields.outlets)
        .bind(fields.pastries)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_listing_fields(
        &self,
        spot_id: Uuid,
        fields: &ListingFields,
    ) -> PortResult<StudySpot> {
        let record = sqlx::query_as::<_, SpotRecord>(
            "UPDATE study_spots
             SET name = $1, location = $2, description = $3, wifi = $4, ac = $5, free = $6,
                 coffee = $7, open_24_7 = $8, outlets = $9, pastries = $10
             WHERE id = $11
             RETURNING id, owner_id, name, location, description, wifi, ac, free, coffee,
                       open_24_7, outlets, pastries, is_trending, average_rating, image_url, created_at",
        )
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(&fields.description)
        .bind(fields.wifi)
        .bind(fields.ac)
        .bind(fields.free)
        .bind(fields.coffee)
        .bind(fields.open_24_7)
        .bind(fields.outlets)
        .bind(fields.pastries)
        .bind(spot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Listing {} not found", spot_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn set_listing_image_url(&self, spot_id: Uuid, image_url: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE study_spots SET image_url = $1 WHERE id = $2")
            .bind(image_url)
            .bind(spot_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Listing {} not found",
                spot_id
            )));
        }
        Ok(())
    }

    async fn delete_listing(&self, spot_id: Uuid) -> PortResult<()> {
        // Reviews cascade away via their foreign key.
        let result = sqlx::query("DELETE FROM study_spots WHERE id = $1")
            .bind(spot_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Listing {} not found",
                spot_id
            )));
        }
        Ok(())
    }

    async fn insert_review(
        &self,
        spot_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> PortResult<Review> {
        // The insert and the average recomputation commit together: no
        // reader observes a review without the updated average.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, ReviewRecord>(
            "INSERT INTO reviews (spot_id, user_id, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING id, spot_id, user_id, rating, comment, created_at",
        )
        .bind(spot_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| write_err(e, "You have already submitted a review for this spot."))?;

        sqlx::query(
            "UPDATE study_spots
             SET average_rating = COALESCE(
                 (SELECT ROUND(AVG(rating)::numeric, 2) FROM reviews WHERE spot_id = $1), 0)
             WHERE id = $1",
        )
        .bind(spot_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn reviews_for_listing(&self, spot_id: Uuid) -> PortResult<Vec<Review>> {
        let records = sqlx::query_as::<_, ReviewRecord>(
            "SELECT id, spot_id, user_id, rating, comment, created_at
             FROM reviews WHERE spot_id = $1 ORDER BY created_at DESC",
        )
        .bind(spot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn recompute_average_rating(&self, spot_id: Uuid) -> PortResult<f64> {
        sqlx::query_scalar::<_, f64>(
            "UPDATE study_spots
             SET average_rating = COALESCE(
                 (SELECT ROUND(AVG(rating)::numeric, 2) FROM reviews WHERE spot_id = $1), 0)
             WHERE id = $1
             RETURNING average_rating",
        )
        .bind(spot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Listing {} not found", spot_id))
            }
            _ => unexpected(e),
        })
    }

    async fn upsert_staff_application(
        &self,
        application: &StaffApplication,
    ) -> PortResult<StaffApplication> {
        let record = sqlx::query_as::<_, StaffApplicationRecord>(
            "INSERT INTO staff_applications
                 (user_id, full_name, business_name, business_address, phone_number,
                  government_id_url, proof_of_ownership_url, proof_of_address_url,
                  status, submitted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (user_id) DO UPDATE SET
                 full_name = EXCLUDED.full_name,
                 business_name = EXCLUDED.business_name,
                 business_address = EXCLUDED.business_address,
                 phone_number = EXCLUDED.phone_number,
                 government_id_url = EXCLUDED.government_id_url,
                 proof_of_ownership_url = EXCLUDED.proof_of_ownership_url,
                 proof_of_address_url = EXCLUDED.proof_of_address_url,
                 status = EXCLUDED.status,
                 submitted_at = EXCLUDED.submitted_at
             RETURNING user_id, full_name, business_name, business_address, phone_number,
                       government_id_url, proof_of_ownership_url, proof_of_address_url,
                       status, submitted_at",
        )
        .bind(application.user_id)
        .bind(&application.full_name)
        .bind(&application.business_name)
        .bind(&application.business_address)
        .bind(&application.phone_number)
        .bind(&application.government_id_url)
        .bind(&application.proof_of_ownership_url)
        .bind(&application.proof_of_address_url)
        .bind(application.status.as_str())
        .bind(application.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn staff_application_for_user(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<StaffApplication>> {
        let record = sqlx::query_as::<_, StaffApplicationRecord>(
            "SELECT user_id, full_name, business_name, business_address, phone_number,
                    government_id_url, proof_of_ownership_url, proof_of_address_url,
                    status, submitted_at
             FROM staff_applications WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn every_amenity_maps_to_a_column() {
        for (amenity, column) in [
            (Amenity::Wifi, "wifi"),
            (Amenity::Ac, "ac"),
            (Amenity::Outlets, "outlets"),
            (Amenity::Coffee, "coffee"),
            (Amenity::Pastries, "pastries"),
            (Amenity::Open24, "open_24_7"),
            (Amenity::Trending, "is_trending"),
        ] {
            assert_eq!(amenity_column(amenity), column);
        }
    }
}
