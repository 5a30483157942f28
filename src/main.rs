use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use inkpress::app::{AppDeps, build_app};
use inkpress::core::auth::{BcryptHasher, JwtService, PasswordHasher};
use inkpress::core::config::Config;
use inkpress::core::db::{
    DbConfig, InMemoryUserStore, UserRepository, UserStore, create_pool_with_migrations,
    pool::health_check,
};
use inkpress::core::mail::{LogMailer, Mailer, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,inkpress=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, mail={}, cors_origins={}, bcrypt_cost={}",
        config.has_database(),
        config.has_mail(),
        config.cors_origins.len(),
        config.bcrypt_cost
    );

    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(_) => {
            let db_config = DbConfig::from_env().context("Invalid database configuration")?;
            let pool = create_pool_with_migrations(&db_config)
                .await
                .context("Failed to connect to PostgreSQL")?;
            health_check(&pool)
                .await
                .context("PostgreSQL health check failed")?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            Arc::new(UserRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(
            SmtpMailer::new(mail, config.mail_links()).context("Invalid mail configuration")?,
        ),
        None => {
            tracing::warn!("MAIL_HOST not set, account mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(config.bcrypt_cost));

    let app = build_app(
        AppDeps {
            store,
            mailer,
            hasher,
            jwt: JwtService::new(config.jwt.clone()),
        },
        &config.cors_origins,
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
