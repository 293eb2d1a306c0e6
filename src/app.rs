use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::models::document::MAX_FILE_SIZE;
use crate::routes::{auth, categories, dashboard, departments, documents, health};
use crate::session::{AuthSession, SqliteSessions};
use crate::storage::{BlobStore, LocalBlobStore, StorageConfig};

/// Room for the multipart framing and text fields around a maximum-size file.
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<dyn AuthSession>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(pool: SqlitePool, sessions: Arc<dyn AuthSession>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, sessions, blobs }
    }

    /// SQLite-backed sessions and a local-disk blob store configured from the environment.
    pub fn from_env(pool: SqlitePool) -> Result<Self, AppError> {
        let jwt_config = JwtConfig::from_env()?;
        let storage = StorageConfig::from_env();

        let sessions = Arc::new(SqliteSessions::new(pool.clone(), jwt_config));
        let blobs = Arc::new(LocalBlobStore::from_config(&storage));
        tracing::info!(storage_root = %storage.root.display(), "using local blob storage");

        Ok(Self::new(pool, sessions, blobs))
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let state = AppState::from_env(pool)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let document_routes = Router::new()
        .route("/", get(documents::index).post(documents::store))
        .route(
            "/:id",
            get(documents::show).patch(documents::update).delete(documents::destroy),
        )
        .route("/:id/download", get(documents::download))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let api_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::me))
        .route("/departments", get(departments::list_departments))
        .route("/categories", get(categories::list_categories))
        .route("/dashboard", get(dashboard::dashboard))
        .nest("/documents", document_routes);

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
