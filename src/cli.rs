//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::db::Database;
use crate::engine::MIN_SECRET_LENGTH;
use crate::settings::AuthSettings;
use clap::Parser;
use tracing::{error, info};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sessiongate",
    about = "Session-based bearer token authentication with revocation"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "sessiongate.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET instead
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET instead
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "100")]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "43200")]
    pub refresh_token_ttl: u64,

    /// How long revoked tokens stay blacklisted, in seconds
    #[arg(long, default_value = "43200")]
    pub blacklist_ttl: u64,

    /// Sessions without activity for this many seconds are reaped
    #[arg(long, default_value = "43200")]
    pub session_idle: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value = "3600")]
    pub reaper_interval: u64,

    /// Use X-Forwarded-For as the client IP (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    /// Collect the engine tunables. Validation happens when the engine is built.
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            access_ttl: Duration::from_secs(self.access_token_ttl),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl),
            blacklist_ttl: Duration::from_secs(self.blacklist_ttl),
            idle_threshold: Duration::from_secs(self.session_idle),
            reaper_interval: Duration::from_secs(self.reaper_interval),
            ..AuthSettings::default()
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            env_var,
            "Signing secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            env_var,
            "Secret is shorter than {} characters. Use a longer secret", MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
) -> ServerConfig {
    ServerConfig {
        db,
        access_secret,
        refresh_secret,
        settings: args.auth_settings(),
        trust_forwarded_for: args.trust_forwarded_for,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
