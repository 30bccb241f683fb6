use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{Resource, SessionProvider, TokenError, TokenService};
use crate::config::{AppConfig, ConfigError, StoreBackend};
use crate::database::{DatabaseError, DatabaseManager, MemoryStore, PgStore, Store};
use crate::handlers;
use crate::middleware::{authenticate, enforce};
use crate::services::Accounts;

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Shared, immutable per-process state injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub sessions: SessionProvider,
    pub accounts: Accounts,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, StateError> {
        let security = &config.security;
        let tokens = TokenService::new(&security.jwt_secret, security.token_ttl()?)?;
        let sessions = SessionProvider::new(
            store.clone(),
            tokens.clone(),
            security.session_max_age()?,
            security.secure_cookies,
        );
        let accounts = Accounts::new(store.clone(), security.password_min_length);

        Ok(Self {
            store,
            tokens,
            sessions,
            accounts,
            config: Arc::new(config),
        })
    }
}

/// Construct the configured persistence backend
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Hourly removal of expired sessions
pub fn spawn_session_purge(store: Arc<dyn Store>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60 * 60));
        loop {
            ticker.tick().await;
            match store.purge_expired_sessions(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(deleted_sessions = count, "Purged expired sessions"),
                Err(e) => tracing::warn!("Session purge failed: {}", e),
            }
        }
    })
}

/// Full application router
pub fn router(state: AppState) -> Router {
    let max_body = state.config.server.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    let api = Router::new()
        .merge(session_routes())
        .merge(school_routes())
        .merge(classroom_routes())
        .merge(student_routes())
        .merge(user_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        // Public
        .route("/", get(handlers::public::root::index))
        .route("/health", get(handlers::public::root::health))
        .route("/api/auth/login", post(handlers::public::auth::login_post))
        .route("/api/user/create-user", post(handlers::public::user::create_user))
        // Authenticated
        .merge(api)
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_body)),
        )
        .with_state(state)
}

fn session_routes() -> Router<AppState> {
    use handlers::protected::auth;

    Router::new()
        .route("/api/auth/session", get(auth::session_get))
        .route("/api/auth/logout", post(auth::logout_post))
}

fn school_routes() -> Router<AppState> {
    use handlers::protected::schools;

    Router::new()
        .route(
            "/api/schools",
            post(schools::post)
                .get(schools::get)
                .put(schools::put)
                .delete(schools::delete),
        )
        .route_layer(middleware::from_fn_with_state(Resource::School, enforce))
}

fn classroom_routes() -> Router<AppState> {
    use handlers::protected::classrooms;

    Router::new()
        .route(
            "/api/classrooms",
            post(classrooms::post)
                .get(classrooms::get)
                .put(classrooms::put)
                .delete(classrooms::delete),
        )
        .route_layer(middleware::from_fn_with_state(Resource::Classroom, enforce))
}

fn student_routes() -> Router<AppState> {
    use handlers::protected::students;

    Router::new()
        .route(
            "/api/students",
            post(students::post)
                .get(students::get)
                .put(students::put)
                .delete(students::delete),
        )
        .route_layer(middleware::from_fn_with_state(Resource::Student, enforce))
}

fn user_routes() -> Router<AppState> {
    use handlers::protected::user;

    let admins = Router::new()
        .route("/api/user/create-admin", post(user::create_admin))
        .route_layer(middleware::from_fn_with_state(Resource::Administrator, enforce));
    let profile = Router::new()
        .route("/api/user/update-profile", put(user::update_profile))
        .route_layer(middleware::from_fn_with_state(Resource::Profile, enforce));

    admins.merge(profile)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
