//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_spots_core::ports::{DatabaseService, ObjectStorage};
use study_spots_core::services::{
    ListingService, ProfileService, ReviewService, StaffApplicationService,
};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub listings: ListingService,
    pub reviews: ReviewService,
    pub profiles: ProfileService,
    pub staff: StaffApplicationService,
}

impl AppState {
    /// Wires the services to their injected ports.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn ObjectStorage>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            listings: ListingService::new(db.clone(), storage.clone()),
            reviews: ReviewService::new(db.clone()),
            profiles: ProfileService::new(db.clone(), storage.clone()),
            staff: StaffApplicationService::new(db.clone(), storage),
            db,
            config,
        }
    }
}
