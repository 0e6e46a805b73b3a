use anyhow::Result;
use axum::Router;
use services::{
    booking_service::BookingService,
    object_store::FsObjectStore,
    storage_gateway::{PublicUrlConfig, StorageGateway},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use state::AppState;
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting rental-market with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(connect_db(&cfg.database_url).await?);

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let object_store = Arc::new(FsObjectStore::new(cfg.storage_dir.clone()));
    let gateway = Arc::new(StorageGateway::new(
        object_store.clone(),
        cfg.bucket.clone(),
        cfg.region.clone(),
        PublicUrlConfig {
            scheme: cfg.public_scheme.clone(),
            endpoint: cfg.public_endpoint.clone(),
            port: cfg.public_port,
        },
    ));
    let booking = Arc::new(BookingService::new(db.clone()));

    // Provision the bucket up front so a misconfigured store fails loudly at
    // boot rather than on the first upload. The gateway stays in its failed
    // state and keeps refusing uploads until remediated.
    if let Err(err) = gateway.ensure_bucket_ready().await {
        tracing::error!("Bucket provisioning failed, uploads disabled: {}", err);
    }

    let app_state = AppState {
        db,
        booking,
        gateway,
        object_store,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the SQLite pool, creating the database file (and its parent
/// directory) on a fresh deployment. Without `create_if_missing` both
/// normal boot and `--migrate` mode die before doing anything.
async fn connect_db(db_url: &str) -> Result<sqlx::Pool<sqlx::Sqlite>> {
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run SQLite migrations manually from the embedded SQL file.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let path = "migrations/0001_init.sql";

    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn connects_on_a_fresh_deployment() {
        let dir = tempdir().unwrap();
        // Neither the meta directory nor the database file exist yet.
        let db_url = format!("sqlite://{}/meta/rental_market.db", dir.path().display());

        let pool = connect_db(&db_url).await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
