use apim_console::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads the configuration, installs logging, opens the repository and serves
/// the console API.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration (fail-fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins over the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apim_console=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Repository: Postgres when configured, in-memory otherwise.
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("database migrations applied");
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory repository");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { repo, config });
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
