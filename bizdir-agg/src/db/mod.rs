//! Database access for bizdir-agg
//!
//! SQLite via sqlx. One `businesses` table keyed by `(name, address)`.

pub mod businesses;

pub use businesses::{fetch_all_businesses, upsert_businesses};

use crate::error::AggResult;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the parent directory and the database file when missing.
pub async fn init_database_pool(db_path: &Path) -> AggResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!(url = %db_url, "Connecting to database");

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the businesses table and its indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> AggResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS businesses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            category TEXT,
            opening_hours TEXT,
            average_rating REAL,
            price_range TEXT,
            source_urls TEXT NOT NULL DEFAULT '[]',
            last_updated TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (name, address)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_businesses_location ON businesses (latitude, longitude)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_businesses_category ON businesses (category)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (businesses)");

    Ok(())
}
