//! scholar-forms - school forms, imports, students and events service

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use scholar_common::config::{ConfigOverrides, ServerConfig};
use scholar_common::db::init_database;
use scholar_common::models::{Role, User};
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

use scholar_forms::{build_router, db, AppState};

/// Email of the master admin created on first start of an empty database
const ENV_BOOTSTRAP_ADMIN: &str = "SCHOLAR_BOOTSTRAP_ADMIN";

/// Command-line arguments; anything left unset falls through to the
/// environment, the TOML config file and compiled defaults
#[derive(Parser, Debug)]
#[command(name = "scholar-forms")]
#[command(about = "School forms, bulk import, student and event service")]
#[command(version)]
struct Args {
    /// Folder holding the SQLite database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(short, long)]
    bind: Option<String>,

    /// Tracing filter (error, warn, info, debug, trace or a full directive)
    #[arg(long)]
    log_level: Option<String>,

    /// Lifetime of issued sessions in hours
    #[arg(long)]
    session_ttl_hours: Option<i64>,

    /// Explicit TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServerConfig::resolve(&ConfigOverrides {
        data_folder: args.data_folder,
        bind_address: args.bind,
        log_level: args.log_level,
        session_ttl_hours: args.session_ttl_hours,
        config_file: args.config,
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting scholar-forms v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config.ensure_data_folder()?;
    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let purged = db::sessions::purge_expired(&pool).await?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    bootstrap_admin(&pool, config.session_ttl_hours).await?;

    let state = AppState::new(pool, config.session_ttl_hours);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("scholar-forms listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the first master admin when the user table is empty.
///
/// The session token is printed once; it is the only way in until the admin
/// console issues more.
async fn bootstrap_admin(pool: &sqlx::SqlitePool, ttl_hours: i64) -> Result<()> {
    if db::users::count_users(pool).await? > 0 {
        return Ok(());
    }
    let Some(email) = std::env::var(ENV_BOOTSTRAP_ADMIN)
        .ok()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
    else {
        warn!(
            "No users exist; set {} to create the first master admin",
            ENV_BOOTSTRAP_ADMIN
        );
        return Ok(());
    };

    let admin = User {
        id: Uuid::new_v4(),
        email,
        first_name: "Master".to_string(),
        last_name: "Admin".to_string(),
        department: None,
        role: Role::MasterAdmin,
        active: true,
        created_at: Utc::now(),
    };
    db::users::insert_user(pool, &admin).await?;
    let token = db::sessions::create_session(pool, admin.id, ttl_hours).await?;

    info!(email = %admin.email, "Created bootstrap master admin");
    info!("Bootstrap session token (shown once): {}", token);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
