//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DisabledStorage, SupabaseStorage},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, register_handler},
        listings::{
            create_listing_handler, delete_listing_handler, list_listings_handler,
            listing_detail_handler, my_listings_handler, trending_listings_handler,
            update_listing_handler,
        },
        middleware::require_auth,
        profile::{get_profile_handler, update_profile_handler, username_check_handler},
        rest::ApiDoc,
        reviews::submit_review_handler,
        staff::{get_staff_application_handler, submit_staff_application_handler},
        state::AppState,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_spots_core::ports::ObjectStorage;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Storage Adapter ---
    // Storage credentials are optional: without them the server runs with
    // uploads disabled rather than refusing to start.
    let storage: Arc<dyn ObjectStorage> = match (&config.storage_url, &config.storage_key) {
        (Some(url), Some(key)) => Arc::new(
            SupabaseStorage::new(
                url.clone(),
                key.clone(),
                config.storage_timeout,
                config.storage_retries,
            )
            .map_err(|e| ApiError::Internal(format!("Failed to build storage client: {}", e)))?,
        ),
        _ => {
            warn!("Storage credentials not found in environment; uploads are disabled.");
            Arc::new(DisabledStorage)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db_adapter, storage, config.clone()));

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required). Review submission resolves the
    // session itself so anonymous callers get the service's own error.
    let public_routes = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/listings", get(list_listings_handler))
        .route("/listings/trending", get(trending_listings_handler))
        .route("/listings/{spot_id}", get(listing_detail_handler))
        .route("/listings/{spot_id}/reviews", post(submit_review_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/listings", post(create_listing_handler))
        .route("/listings/mine", get(my_listings_handler))
        .route(
            "/listings/{spot_id}",
            put(update_listing_handler).delete(delete_listing_handler),
        )
        .route(
            "/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/profile/username-check", post(username_check_handler))
        .route(
            "/staff-application",
            get(get_staff_application_handler).post(submit_staff_application_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
