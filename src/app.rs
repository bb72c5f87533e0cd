//! Router assembly and startup wiring.

use crate::{
    auth::{
        api as auth_api, auth_middleware, middleware::current_session, AccountStore, AuthService,
        AuthState, JwtHandler, MemoryAccountStore, PasswordHasher, SqliteAccountStore,
    },
    config::Config,
    middleware::request_logging,
};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Build every component the router needs from validated configuration.
/// Any failure here is fatal for the process.
pub fn build_state(config: &Config) -> Result<AuthState> {
    let secret = config
        .signing_secret()
        .context("JWT_SECRET is not set; refusing to start without a signing secret")?;
    let jwt_handler = Arc::new(JwtHandler::new(secret)?);
    let hasher = PasswordHasher::new(config.bcrypt_cost)?;

    let store: Arc<dyn AccountStore> = if config.in_memory {
        info!("Using in-memory account store (nothing is persisted)");
        Arc::new(MemoryAccountStore::new())
    } else {
        Arc::new(
            SqliteAccountStore::open(&config.database_url)
                .context("Failed to open account store")?,
        )
    };

    Ok(AuthState::new(AuthService::new(store, hasher, jwt_handler)))
}

/// Build the full HTTP router
pub fn build_router(auth_state: AuthState) -> Router {
    let jwt_handler = auth_state.service.jwt().clone();

    // Public auth routes
    let auth_router = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login));

    // Protected API routes
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_account))
        .route("/api/auth/session", get(current_session))
        .route_layer(middleware::from_fn_with_state(jwt_handler, auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_router)
        .merge(protected_routes)
        .with_state(auth_state)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "ok"
}
