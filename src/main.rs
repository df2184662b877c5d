use clap::Parser;
use sessiongate::cli::{Args, build_config, init_logging, load_secret, open_database};
use sessiongate::{create_app, init_reaper, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret(
        "ACCESS_TOKEN_SECRET",
        args.access_token_secret_file.as_deref(),
    ) else {
        std::process::exit(1);
    };

    let Some(refresh_secret) = load_secret(
        "REFRESH_TOKEN_SECRET",
        args.refresh_token_secret_file.as_deref(),
    ) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, access_secret, refresh_secret);
    let app = match create_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    init_reaper(&config.db, &config.settings).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    if let Err(e) = run_server(app, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
