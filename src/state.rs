use crate::services::{
    booking_service::BookingService, object_store::FsObjectStore,
    storage_gateway::StorageGateway,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// SQLite pool for the entity tables.
    pub db: Arc<SqlitePool>,

    /// Availability checking and rental creation.
    pub booking: Arc<BookingService>,

    /// Bucket lifecycle and file ingestion.
    pub gateway: Arc<StorageGateway>,

    /// Concrete object store, used directly for serving object reads and
    /// the readiness probe.
    pub object_store: Arc<FsObjectStore>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AppState;
    use crate::services::{
        booking_service::BookingService,
        object_store::FsObjectStore,
        storage_gateway::{PublicUrlConfig, StorageGateway},
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    /// AppState over an in-memory database and a temp-dir object store,
    /// schema applied. The caller keeps the TempDir alive.
    pub(crate) async fn app_state(dir: &tempfile::TempDir) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        let db = Arc::new(pool);
        let object_store = Arc::new(FsObjectStore::new(dir.path()));
        let gateway = Arc::new(StorageGateway::new(
            object_store.clone(),
            "item-media",
            "local",
            PublicUrlConfig {
                scheme: "http".into(),
                endpoint: "localhost".into(),
                port: 3000,
            },
        ));
        AppState {
            db: db.clone(),
            booking: Arc::new(BookingService::new(db)),
            gateway,
            object_store,
        }
    }
}
