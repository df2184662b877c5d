pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod reaper;
pub mod rotation;
pub mod settings;

use api::create_api_router;
use axum::Router;
use db::Database;
use engine::AuthEngine;
use error::AuthError;
use rate_limit::RateLimitConfig;
use settings::AuthSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens, must differ from `access_secret`
    pub refresh_secret: Vec<u8>,
    pub settings: AuthSettings,
    /// Take the client IP from X-Forwarded-For (requires running behind a proxy)
    pub trust_forwarded_for: bool,
}

/// Build the engine described by the configuration.
pub fn create_engine(config: &ServerConfig) -> Result<AuthEngine, AuthError> {
    AuthEngine::new(
        config.db.clone(),
        &config.access_secret,
        &config.refresh_secret,
        config.settings.clone(),
    )
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, AuthError> {
    let engine = Arc::new(create_engine(config)?);
    let rate_limit = Arc::new(RateLimitConfig::with_defaults(config.trust_forwarded_for));
    Ok(create_api_router(engine, rate_limit))
}

/// Sweep idle sessions once and spawn the background reaper.
/// Call this before starting the server.
pub async fn init_reaper(db: &Database, settings: &AuthSettings) -> tokio::task::JoinHandle<()> {
    if let Err(e) = reaper::run_sweep(db, settings).await {
        tracing::error!(error = %e, "Startup session sweep aborted");
    }
    reaper::spawn_reaper_scheduler(db.clone(), settings.clone())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_app(&config)?;
    init_reaper(&config.db, &config.settings).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(app, listener).await.ok();
    });

    Ok((handle, local_addr))
}
