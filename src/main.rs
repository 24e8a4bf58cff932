use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal;

use crate::config::Config;
use crate::utils::cli::Args;
use crate::utils::state::AppState;

mod api;
mod config;
mod domain;
mod error;
mod lifecycle;
mod service;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = validate_config(&args).await;

    let pool = SqlitePoolOptions::new()
        .max_connections(12)
        .connect(config.db_url.as_str())
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let state = Arc::new(AppState::new(config, Arc::new(pool)).await);
    let app = api::create_router(state.clone());

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", state.config.host, state.config.port))
            .await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down...");
}

async fn validate_config(args: &Args) -> Config {
    let mut validation_errors = Vec::new();

    if args.storage == "FILESYSTEM" {
        let root_dir = Path::new(&args.root);
        match tokio::fs::metadata(root_dir).await {
            Ok(meta) => {
                if !meta.is_dir() {
                    validation_errors.push(format!(
                        "IMAGEHUB_ROOTDIR `{}` exists but is not a directory",
                        args.root,
                    ));
                }
            }
            Err(_) => validation_errors.push(format!(
                "IMAGEHUB_ROOTDIR `{}` does not exist.",
                args.root,
            )),
        }
    }

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        eprintln!("WARNING: JWT_SECRET is not set. Use default value: `secret`");
        "secret".into()
    });
    let jwt_lifetime_secs = std::env::var("JWT_LIFETIME_SECONDS")
        .unwrap_or_else(|_| {
            eprintln!("WARNING: JWT_LIFETIME_SECONDS is not set. Use default value: 604800");
            "604800".into()
        })
        .parse::<i64>()
        .unwrap();

    if !validation_errors.is_empty() {
        eprintln!("{}", validation_errors.join("\n"));
        std::process::exit(1);
    }

    Config {
        host: args.host.clone(),
        port: args.port,
        storage_typ: args.storage.clone(),
        root_dir: args.root.clone(),
        public_url: args.url.clone(),
        db_url: args.database_url.clone(),
        bucket: args.bucket.clone(),
        region: args.region.clone(),
        s3_endpoint: args.s3_endpoint.clone(),
        jwt_secret,
        jwt_lifetime_secs,
    }
}
