//! Business persistence
//!
//! Writes the store's canonical records. The merge policy has already been
//! applied in memory; the upsert only fills columns the incoming row leaves
//! NULL from the stored row.

use crate::error::AggResult;
use crate::types::{CanonicalRecord, ExportedBusiness, OpeningHours};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Upsert every record in one transaction
///
/// Coordinates, category, opening hours and price range keep the stored value
/// when the incoming one is NULL. Rating, source URLs and last-updated are
/// overwritten.
pub async fn upsert_businesses(pool: &SqlitePool, records: &[CanonicalRecord]) -> AggResult<usize> {
    let mut tx = pool.begin().await?;

    for record in records {
        let business = record.to_exported();
        let opening_hours = business
            .opening_hours
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let source_urls = serde_json::to_string(&business.source_urls)?;

        sqlx::query(
            r#"
            INSERT INTO businesses (
                name, address, latitude, longitude, category, opening_hours,
                average_rating, price_range, source_urls, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name, address) DO UPDATE SET
                latitude = COALESCE(excluded.latitude, latitude),
                longitude = COALESCE(excluded.longitude, longitude),
                category = COALESCE(excluded.category, category),
                opening_hours = COALESCE(excluded.opening_hours, opening_hours),
                average_rating = excluded.average_rating,
                price_range = COALESCE(excluded.price_range, price_range),
                source_urls = excluded.source_urls,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&business.name)
        .bind(&business.address)
        .bind(business.latitude)
        .bind(business.longitude)
        .bind(&business.category)
        .bind(opening_hours)
        .bind(business.average_rating)
        .bind(business.price_range.map(|p| p.as_str()))
        .bind(source_urls)
        .bind(business.last_updated)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(count = records.len(), "Saved businesses to database");
    Ok(records.len())
}

/// Load every stored business, ordered by name then address
pub async fn fetch_all_businesses(pool: &SqlitePool) -> AggResult<Vec<ExportedBusiness>> {
    let rows = sqlx::query(
        r#"
        SELECT name, address, latitude, longitude, category, opening_hours,
               average_rating, price_range, source_urls, last_updated
        FROM businesses
        ORDER BY name, address
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut businesses = Vec::with_capacity(rows.len());
    for row in rows {
        let opening_hours: Option<String> = row.try_get("opening_hours")?;
        let price_range: Option<String> = row.try_get("price_range")?;
        let source_urls: String = row.try_get("source_urls")?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated")?;

        businesses.push(ExportedBusiness {
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            category: row.try_get("category")?,
            opening_hours: opening_hours
                .map(|json| serde_json::from_str::<OpeningHours>(&json))
                .transpose()?,
            average_rating: row.try_get("average_rating")?,
            // Values written by this module always parse
            price_range: price_range.and_then(|p| p.parse().ok()),
            source_urls: serde_json::from_str(&source_urls)?,
            last_updated,
        });
    }

    debug!(count = businesses.len(), "Loaded businesses from database");
    Ok(businesses)
}
