use crate::db_storage::{KycStore, MemoryKycStore, PgKycStore};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Opens the record store: Postgres when a URL is configured and reachable,
/// otherwise a process-local in-memory store.
pub async fn open_store(database_url: Option<&str>) -> Arc<dyn KycStore> {
    let Some(url) = database_url else {
        tracing::warn!("No database configured, using in-memory KYC store");
        return Arc::new(MemoryKycStore::new());
    };

    let store = match Database::new(url).await {
        Ok(db) => PgKycStore::new(db.pool),
        Err(e) => {
            tracing::error!("Database unavailable ({}), using in-memory KYC store", e);
            return Arc::new(MemoryKycStore::new());
        }
    };

    if let Err(e) = store.ensure_schema().await {
        tracing::error!("Failed to prepare kyc schema ({}), using in-memory KYC store", e);
        return Arc::new(MemoryKycStore::new());
    }

    tracing::info!("Database connection pool established");
    Arc::new(store)
}
