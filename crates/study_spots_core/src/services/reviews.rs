//! crates/study_spots_core/src/services/reviews.rs
//!
//! Review submission and rating aggregation. A review can be left once per
//! (listing, user) pair and is immutable afterwards; the parent listing's
//! average rating is recomputed in the same transaction as the insert.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Review, MAX_RATING, MIN_RATING};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<dyn DatabaseService>,
}

impl ReviewService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Submits a review on behalf of `caller`.
    ///
    /// Anonymous callers are rejected before anything else; the rating must
    /// be an integer in [1,5]. Duplicate submissions surface as `Conflict`
    /// from the persistence layer's uniqueness constraint, which also
    /// closes the race between two concurrent first submissions.
    pub async fn submit(
        &self,
        spot_id: Uuid,
        caller: Option<Uuid>,
        rating: i32,
        comment: Option<String>,
    ) -> PortResult<Review> {
        let user_id = caller.ok_or(PortError::Unauthenticated)?;

        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(PortError::Validation(format!(
                "rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        // Surfaces NotFound for a dangling listing id before the insert.
        self.db.get_listing(spot_id).await?;

        self.db
            .insert_review(spot_id, user_id, rating, comment.as_deref())
            .await
    }

    /// The listing's reviews, newest first.
    pub async fn for_listing(&self, spot_id: Uuid) -> PortResult<Vec<Review>> {
        self.db.reviews_for_listing(spot_id).await
    }

    /// Recomputes the listing's persisted average from its current reviews.
    /// The submit path already does this transactionally; this entry point
    /// exists to repair an average after an interrupted recomputation.
    pub async fn recompute_average(&self, spot_id: Uuid) -> PortResult<f64> {
        self.db.recompute_average_rating(spot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListingFields;
    use crate::testing::{InMemoryDb, InMemoryStorage};
    use crate::ListingService;

    async fn user(db: &InMemoryDb, username: &str) -> Uuid {
        db.create_user(username, &format!("{}@example.com", username), "hash")
            .await
            .unwrap()
            .id
    }

    async fn setup() -> (Arc<InMemoryDb>, ReviewService, Uuid) {
        let db = Arc::new(InMemoryDb::new());
        let storage = Arc::new(InMemoryStorage::new());

        let owner = user(&db, "owner").await;
        db.grant_contributor(owner);
        let listings = ListingService::new(db.clone(), storage);
        let saved = listings
            .create(
                owner,
                ListingFields {
                    name: "Library A".to_string(),
                    location: "Campus".to_string(),
                    ..ListingFields::default()
                },
                None,
            )
            .await
            .unwrap();

        (db.clone(), ReviewService::new(db), saved.spot.id)
    }

    #[tokio::test]
    async fn anonymous_submission_is_rejected() {
        let (_db, service, spot_id) = setup().await;
        let err = service.submit(spot_id, None, 4, None).await.unwrap_err();
        assert!(matches!(err, PortError::Unauthenticated));
    }

    #[tokio::test]
    async fn rating_must_be_in_range() {
        let (db, service, spot_id) = setup().await;
        let reviewer = user(&db, "reviewer").await;

        for rating in [0, 6, -1] {
            let err = service
                .submit(spot_id, Some(reviewer), rating, None)
                .await
                .unwrap_err();
            assert!(matches!(err, PortError::Validation(_)));
        }
        // Bounds are inclusive.
        service.submit(spot_id, Some(reviewer), 1, None).await.unwrap();
    }

    #[tokio::test]
    async fn missing_listing_is_not_found() {
        let (db, service, _spot_id) = setup().await;
        let reviewer = user(&db, "reviewer").await;
        let err = service
            .submit(Uuid::new_v4(), Some(reviewer), 4, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn average_updates_with_each_review() {
        let (db, service, spot_id) = setup().await;

        // No reviews yet: the derived average is 0.00.
        assert_eq!(db.get_listing(spot_id).await.unwrap().average_rating, 0.0);

        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        let c = user(&db, "c").await;

        service.submit(spot_id, Some(a), 4, None).await.unwrap();
        service.submit(spot_id, Some(b), 5, None).await.unwrap();
        assert_eq!(db.get_listing(spot_id).await.unwrap().average_rating, 4.5);

        service
            .submit(spot_id, Some(c), 3, Some("crowded at noon".to_string()))
            .await
            .unwrap();
        assert_eq!(db.get_listing(spot_id).await.unwrap().average_rating, 4.0);
    }

    #[tokio::test]
    async fn second_review_from_same_user_conflicts_and_changes_nothing() {
        let (db, service, spot_id) = setup().await;
        let reviewer = user(&db, "reviewer").await;

        let original = service
            .submit(spot_id, Some(reviewer), 5, Some("great".to_string()))
            .await
            .unwrap();

        let err = service
            .submit(spot_id, Some(reviewer), 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        // The original review and the average are untouched.
        let reviews = service.for_listing(spot_id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, original.id);
        assert_eq!(reviews[0].rating, 5);
        assert_eq!(db.get_listing(spot_id).await.unwrap().average_rating, 5.0);
    }

    #[tokio::test]
    async fn reviews_come_back_newest_first() {
        let (db, service, spot_id) = setup().await;
        let a = user(&db, "a").await;
        let b = user(&db, "b").await;

        service.submit(spot_id, Some(a), 4, None).await.unwrap();
        service.submit(spot_id, Some(b), 2, None).await.unwrap();

        let reviews = service.for_listing(spot_id).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].user_id, b);
        assert_eq!(reviews[1].user_id, a);
    }

    #[tokio::test]
    async fn recompute_average_repairs_persisted_value() {
        let (db, service, spot_id) = setup().await;
        let a = user(&db, "a").await;
        service.submit(spot_id, Some(a), 4, None).await.unwrap();

        db.corrupt_average(spot_id, 9.99);
        let recomputed = service.recompute_average(spot_id).await.unwrap();
        assert_eq!(recomputed, 4.0);
        assert_eq!(db.get_listing(spot_id).await.unwrap().average_rating, 4.0);
    }
}
