pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod rate_limit;

use api::create_api_router;
use auth::PermissionGate;
use axum::{Json, Router, routing::get};
use db::Database;
use jwt::TokenAuthority;
use rate_limit::RateLimitConfig;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Prefix for all REST endpoints.
pub const API_PREFIX: &str = "/v1/api";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Issues and verifies access/refresh tokens
    pub authority: Arc<TokenAuthority>,
    /// bcrypt cost for newly hashed passwords
    pub password_cost: u32,
    /// Login attempts allowed per client IP per minute
    pub login_attempts_per_minute: NonZeroU32,
    /// Key rate limits by `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
}

/// Create the application router with the given configuration.
///
/// Spawns the rate limiter cleanup task, so it must run inside a Tokio runtime.
pub fn create_app(config: &ServerConfig) -> Router {
    let gate = Arc::new(PermissionGate::new(
        config.authority.clone(),
        config.db.clone(),
    ));

    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.login_attempts_per_minute,
        config.trust_forwarded_for,
    ));
    cleanup::spawn_cleanup_scheduler(&rate_limit_config);

    let api_router = create_api_router(
        config.db.clone(),
        gate,
        config.password_cost,
        rate_limit_config,
    );

    Router::new()
        .route("/", get(index))
        .nest(API_PREFIX, api_router)
}

async fn index() -> Json<Value> {
    Json(json!({ "message": "This is the main Page" }))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
