use crate::common::models::LocationHit;
use crate::server::database::Database;
use sqlx::Row;
use std::sync::Arc;

/// Airports and cities on the USA-Ghana corridor served by the lookup
/// endpoint. Inserted idempotently at startup.
const SEED_LOCATIONS: &[(&str, &str)] = &[
    ("JFK", "New York (JFK)"),
    ("EWR", "Newark (EWR)"),
    ("IAD", "Washington Dulles (IAD)"),
    ("BWI", "Baltimore (BWI)"),
    ("ATL", "Atlanta (ATL)"),
    ("ORD", "Chicago O'Hare (ORD)"),
    ("BOS", "Boston (BOS)"),
    ("CLT", "Charlotte (CLT)"),
    ("ACC", "Accra Kotoka (ACC)"),
    ("KMS", "Kumasi (KMS)"),
    ("TML", "Tamale (TML)"),
    ("TKD", "Takoradi (TKD)"),
];

pub async fn seed_locations(db: Arc<Database>) -> anyhow::Result<()> {
    for (id, label) in SEED_LOCATIONS {
        sqlx::query("INSERT OR IGNORE INTO locations (id, label) VALUES (?, ?)")
            .bind(id)
            .bind(label)
            .execute(&db.pool)
            .await?;
    }
    log::info!("[LOCATIONS] Seeded {} locations", SEED_LOCATIONS.len());
    Ok(())
}

/// Case-insensitive substring lookup over location labels and codes.
pub async fn lookup_locations(db: Arc<Database>, q: Option<&str>) -> anyhow::Result<Vec<LocationHit>> {
    let needle = q.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

    let rows = match needle {
        Some(needle) => {
            sqlx::query("SELECT id, label FROM locations WHERE lower(id || ' ' || label) LIKE ? ORDER BY label")
                .bind(format!("%{}%", needle))
                .fetch_all(&db.pool)
                .await?
        }
        None => {
            sqlx::query("SELECT id, label FROM locations ORDER BY label")
                .fetch_all(&db.pool)
                .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| LocationHit { id: row.get("id"), label: row.get("label") })
        .collect())
}
