//! yamdb-api - content rating service
//!
//! Serves the REST API by default. `create-admin` bootstraps an
//! administrator account and `write-config` dumps the effective settings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamdb_api::api::issue_confirmation_code;
use yamdb_api::db::users::{self, NewUser};
use yamdb_api::mail::mailer_from_config;
use yamdb_api::{build_router, AppState};
use yamdb_common::api::{load_jwt_secret, TokenKeys};
use yamdb_common::config::{load_toml_config, resolve_config_path, write_toml_config, TomlConfig};
use yamdb_common::db::{init_database, Role};

/// Command-line arguments for yamdb-api
#[derive(Parser, Debug)]
#[command(name = "yamdb-api")]
#[command(about = "YaMDb content rating service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "YAMDB_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "YAMDB_DATABASE")]
    database: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "YAMDB_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "YAMDB_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an administrator, or promote an existing user, and print a confirmation code
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Write the effective configuration as TOML
    WriteConfig {
        /// Destination (defaults to the resolved config path)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_toml_config(config_path.as_deref()).context("Failed to load config")?;
    apply_overrides(&mut config, &args);

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("yamdb_api={0},yamdb_common={0},tower_http={0}", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting YaMDb API (yamdb-api) v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    match args.command {
        Some(Command::WriteConfig { path }) => {
            let path = path
                .or(config_path)
                .context("No config path given and no default config location")?;
            write_toml_config(&config, &path)?;
            info!("Wrote config to {}", path.display());
            Ok(())
        }
        Some(Command::CreateAdmin { username, email }) => create_admin(&config, &username, &email).await,
        None => serve(config).await,
    }
}

/// CLI flags and environment variables override the file
fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(database) = &args.database {
        config.database_path = Some(database.clone());
    }
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
}

async fn serve(config: TomlConfig) -> Result<()> {
    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let secret = match config.auth.jwt_secret.clone().filter(|s| !s.is_empty()) {
        Some(secret) => {
            info!("Using token signing secret from config");
            secret
        }
        None => load_jwt_secret(&pool)
            .await
            .context("Failed to load token signing secret")?,
    };
    let keys = TokenKeys::new(&secret, config.auth.access_token_lifetime_secs);

    let state = AppState::new(pool, keys, mailer_from_config(&config))
        .with_from_address(config.mail.from_address.clone())
        .with_page_size(config.page_size);
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("yamdb-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn create_admin(config: &TomlConfig, username: &str, email: &str) -> Result<()> {
    let pool = init_database(&config.database_path())
        .await
        .context("Failed to initialize database")?;

    let user = match users::find_by_username(&pool, username).await? {
        Some(mut user) => {
            user.role = Role::Admin;
            user.is_superuser = true;
            users::save_user(&pool, &user).await?;
            info!("Promoted {} to administrator", user.username);
            user
        }
        None => {
            let new_user = NewUser {
                role: Role::Admin,
                is_superuser: true,
                ..NewUser::signup(username, email)
            };
            let user = users::create_user(&pool, &new_user).await?;
            info!("Created administrator {}", user.username);
            user
        }
    };

    let code = issue_confirmation_code(&pool, &user).await?;
    println!("Confirmation code for {}: {}", user.username, code);
    println!("Exchange it at POST /api/v1/auth/token/");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
