mod auth;
mod cache;
mod config;
mod error;
mod ids;
mod models;
mod routes;
mod services;
mod validation;

use std::sync::Arc;

use anyhow::Context;
use auth::provider::AuthProvider;
use cache::QueryCache;
use clap::{Parser, Subcommand};
use config::Config;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub cache: Arc<QueryCache>,
    pub auth: AuthProvider,
}

#[derive(Parser)]
#[command(name = "accounthub-admin")]
#[command(about = "AccountHub admin back-office API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Give an auth-provider user access to the back-office
    GrantAdmin {
        /// User id issued by the auth provider
        #[arg(long)]
        auth_user_id: Uuid,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let cli = Cli::parse();

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, config).await,
        Command::Migrate => {
            migrate(&db).await?;
            tracing::info!("migrations applied");
            Ok(())
        }
        Command::GrantAdmin {
            auth_user_id,
            email,
            full_name,
        } => {
            let admin =
                services::admins::grant(&db, auth_user_id, &email, full_name.as_deref()).await?;
            tracing::info!(admin_id = %admin.id, email = %admin.email, "admin access granted");
            Ok(())
        }
    }
}

async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!()
        .run(db)
        .await
        .context("failed to run migrations")
}

async fn serve(db: PgPool, config: Config) -> anyhow::Result<()> {
    migrate(&db).await?;

    let auth = AuthProvider::new(&config.auth).context("failed to build auth provider client")?;
    let cache = Arc::new(QueryCache::new(config.cache_ttl, config.cache_max_entries));
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        db,
        config: Arc::new(config),
        cache,
        auth,
    };
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
