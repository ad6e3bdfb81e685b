use apis::setup_routes;
use axum::Router;
use repositories::{
    memory_relationship_repository::InMemoryRelationshipRepository,
    pg_relationship_repository::PgRelationshipRepository,
    relationship_repository::RelationshipStore,
};
use services::{
    notification_service::{ActivityNotifier, LogActivityNotifier, RedisActivityNotifier},
    relationship_service::RelationshipService,
    user_service::UserService,
};
use settings::{Settings, StorageBackend};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use utils::api_errors::ApiError;

pub mod apis;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;
pub mod utils;

pub struct AppState {
    pub user_service: UserService,
    pub relationship_service: RelationshipService,
}

impl AppState {
    pub fn new(store: Arc<dyn RelationshipStore>, notifier: Arc<dyn ActivityNotifier>) -> Self {
        Self {
            user_service: UserService::new(store.clone()),
            relationship_service: RelationshipService::new(store, notifier),
        }
    }
}

pub async fn setup_database(database_url: &str) -> Result<Arc<PgPool>, sqlx::Error> {
    let pool = PgPool::connect(database_url).await?;
    Ok(Arc::new(pool))
}

pub async fn setup_store(settings: &Settings) -> Result<Arc<dyn RelationshipStore>, ApiError> {
    let backend = settings
        .storage_backend()
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    match backend {
        StorageBackend::Memory => {
            warn!("Using the in-memory store, nothing will be persisted");
            Ok(Arc::new(InMemoryRelationshipRepository::new()))
        }
        StorageBackend::Postgres => {
            let database_url = settings
                .database_url()
                .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
            let db = setup_database(database_url).await?;
            if settings.run_migrations.unwrap_or(false) {
                info!("Running database migrations");
                sqlx::migrate!().run(db.as_ref()).await?;
            }
            Ok(Arc::new(PgRelationshipRepository::new(db)))
        }
    }
}

pub fn setup_notifier(settings: &Settings) -> Result<Arc<dyn ActivityNotifier>, ApiError> {
    match &settings.redis_url {
        Some(redis_url) => Ok(Arc::new(RedisActivityNotifier::new(redis_url)?)),
        None => {
            info!("REDIS_URL not set, activity events will only be logged");
            Ok(Arc::new(LogActivityNotifier))
        }
    }
}

/// The full HTTP application over already constructed services.
pub fn app(state: Arc<AppState>) -> Router {
    setup_routes()
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn setup_router(settings: &Settings) -> Result<Router, Box<dyn std::error::Error>> {
    let store = setup_store(settings).await?;
    let notifier = setup_notifier(settings)?;
    Ok(app(Arc::new(AppState::new(store, notifier))))
}

pub fn init_tracing(settings: &Settings) {
    let level = if settings.is_production() {
        tracing::Level::INFO
    } else {
        tracing::Level::DEBUG
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_ansi(!settings.is_production())
        .init();
}
