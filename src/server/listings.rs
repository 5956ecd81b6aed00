use crate::common::models::{ListingKind, ListingRecord, LocationInfo, OwnerRef, Segment};
use crate::server::database::Database;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

/// Payload accepted when an owner publishes a new listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub origin: LocationInfo,
    pub destination: LocationInfo,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub ready_by: Option<String>,
    pub max_weight_kg: f64,
    pub price_per_kg: f64,
    pub currency: String,
    pub type_of_listing: ListingKind,
    #[serde(default)]
    pub urgency: Option<String>,
    pub owner: OwnerRef,
}

/// Partial edit applied by the owner; absent fields stay untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub ready_by: Option<String>,
    #[serde(default)]
    pub max_weight_kg: Option<f64>,
    #[serde(default)]
    pub price_per_kg: Option<f64>,
    #[serde(default)]
    pub urgency: Option<String>,
}

fn validate_new_listing(new: &NewListing) -> anyhow::Result<()> {
    if new.title.trim().is_empty() {
        anyhow::bail!("Title is required");
    }
    if new.description.trim().is_empty() {
        anyhow::bail!("Description is required");
    }
    if new.max_weight_kg <= 0.0 {
        anyhow::bail!("Maximum weight must be greater than zero");
    }
    if new.price_per_kg < 0.0 {
        anyhow::bail!("Price per kg cannot be negative");
    }
    if new.currency.trim().is_empty() {
        anyhow::bail!("Currency is required");
    }
    if new.owner.id.trim().is_empty() {
        anyhow::bail!("Owner reference is required");
    }
    match new.type_of_listing {
        ListingKind::Travel if new.departure_date.is_none() => {
            anyhow::bail!("Travel listings need a departure date")
        }
        ListingKind::Shipment if new.ready_by.is_none() => {
            anyhow::bail!("Shipment listings need a ready-by date")
        }
        _ => Ok(()),
    }
}

pub async fn create_listing(db: Arc<Database>, new: NewListing) -> anyhow::Result<ListingRecord> {
    validate_new_listing(&new)?;

    let record = ListingRecord {
        id: Uuid::new_v4().to_string(),
        title: new.title.trim().to_string(),
        description: new.description.trim().to_string(),
        origin: new.origin,
        destination: new.destination,
        departure_date: new.departure_date,
        ready_by: new.ready_by,
        max_weight_kg: new.max_weight_kg,
        price_per_kg: new.price_per_kg,
        currency: new.currency,
        verified: false,
        type_of_listing: new.type_of_listing,
        // Urgency only carries meaning for shipment requests
        urgency: match new.type_of_listing {
            ListingKind::Shipment => new.urgency,
            ListingKind::Travel => None,
        },
        owner: new.owner,
    };

    sqlx::query(r#"
        INSERT INTO listings (
            id, title, description,
            origin_city, origin_name, origin_code,
            destination_city, destination_name, destination_code,
            departure_date, ready_by,
            max_weight_kg, price_per_kg, currency, verified,
            kind, urgency, owner_id, owner_name, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#)
    .bind(&record.id)
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.origin.city)
    .bind(&record.origin.name)
    .bind(&record.origin.code)
    .bind(&record.destination.city)
    .bind(&record.destination.name)
    .bind(&record.destination.code)
    .bind(&record.departure_date)
    .bind(&record.ready_by)
    .bind(record.max_weight_kg)
    .bind(record.price_per_kg)
    .bind(&record.currency)
    .bind(record.verified as i32)
    .bind(record.type_of_listing.as_str())
    .bind(&record.urgency)
    .bind(&record.owner.id)
    .bind(&record.owner.name)
    .bind(chrono::Utc::now().timestamp())
    .execute(&db.pool)
    .await?;

    log::info!("[LISTINGS] Created {} listing {} by {}", record.type_of_listing.as_str(), record.id, record.owner.id);
    Ok(record)
}

/// Owner-only edit. Anyone else gets an error; the listing is never deleted.
pub async fn update_listing(
    db: Arc<Database>,
    listing_id: &str,
    actor_id: &str,
    patch: ListingUpdate,
) -> anyhow::Result<ListingRecord> {
    let existing = get_listing(db.clone(), listing_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Listing not found"))?;

    if existing.owner.id != actor_id {
        anyhow::bail!("Only the owner can edit this listing");
    }

    let mut updated = existing;
    if let Some(title) = patch.title {
        if title.trim().is_empty() {
            anyhow::bail!("Title is required");
        }
        updated.title = title.trim().to_string();
    }
    if let Some(description) = patch.description {
        updated.description = description.trim().to_string();
    }
    if let Some(departure_date) = patch.departure_date {
        updated.departure_date = Some(departure_date);
    }
    if let Some(ready_by) = patch.ready_by {
        updated.ready_by = Some(ready_by);
    }
    if let Some(weight) = patch.max_weight_kg {
        if weight <= 0.0 {
            anyhow::bail!("Maximum weight must be greater than zero");
        }
        updated.max_weight_kg = weight;
    }
    if let Some(price) = patch.price_per_kg {
        if price < 0.0 {
            anyhow::bail!("Price per kg cannot be negative");
        }
        updated.price_per_kg = price;
    }
    if let Some(urgency) = patch.urgency {
        if updated.type_of_listing == ListingKind::Shipment {
            updated.urgency = Some(urgency);
        }
    }

    sqlx::query(r#"
        UPDATE listings SET
            title = ?, description = ?, departure_date = ?, ready_by = ?,
            max_weight_kg = ?, price_per_kg = ?, urgency = ?
        WHERE id = ?
    "#)
    .bind(&updated.title)
    .bind(&updated.description)
    .bind(&updated.departure_date)
    .bind(&updated.ready_by)
    .bind(updated.max_weight_kg)
    .bind(updated.price_per_kg)
    .bind(&updated.urgency)
    .bind(listing_id)
    .execute(&db.pool)
    .await?;

    log::info!("[LISTINGS] Updated listing {} by owner {}", listing_id, actor_id);
    Ok(updated)
}

pub async fn get_listing(db: Arc<Database>, listing_id: &str) -> anyhow::Result<Option<ListingRecord>> {
    let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
        .bind(listing_id)
        .fetch_optional(&db.pool)
        .await?;
    Ok(row.as_ref().map(row_to_listing))
}

/// Case-insensitive substring search across the listing's text fields, with an
/// optional kind filter from the segment. Each partition comes back sorted
/// ascending by its kind's date column.
pub async fn search_listings(
    db: Arc<Database>,
    q: Option<&str>,
    segment: Segment,
) -> anyhow::Result<(Vec<ListingRecord>, Vec<ListingRecord>)> {
    let mut sql = String::from("SELECT * FROM listings");
    let mut clauses: Vec<&str> = Vec::new();

    let kind = segment.kind_filter();
    if kind.is_some() {
        clauses.push("kind = ?");
    }
    let needle = q.map(|s| format!("%{}%", s.trim().to_lowercase())).filter(|s| s != "%%");
    if needle.is_some() {
        clauses.push(
            "lower(title || ' ' || description || ' ' || origin_city || ' ' || origin_name || ' ' || origin_code \
             || ' ' || destination_city || ' ' || destination_name || ' ' || destination_code) LIKE ?",
        );
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let mut query = sqlx::query(&sql);
    if let Some(kind) = kind {
        query = query.bind(kind.as_str());
    }
    if let Some(ref needle) = needle {
        query = query.bind(needle);
    }

    let rows = query.fetch_all(&db.pool).await?;
    let mut travellers: Vec<ListingRecord> = Vec::new();
    let mut shipments: Vec<ListingRecord> = Vec::new();
    for row in &rows {
        let record = row_to_listing(row);
        match record.type_of_listing {
            ListingKind::Travel => travellers.push(record),
            ListingKind::Shipment => shipments.push(record),
        }
    }
    travellers.sort_by_key(|r| r.date_epoch_ms());
    shipments.sort_by_key(|r| r.date_epoch_ms());

    Ok((travellers, shipments))
}

fn row_to_listing(row: &SqliteRow) -> ListingRecord {
    let kind = ListingKind::from_str(&row.get::<String, _>("kind")).unwrap_or(ListingKind::Travel);
    ListingRecord {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        origin: LocationInfo {
            city: row.get("origin_city"),
            name: row.get("origin_name"),
            code: row.get("origin_code"),
        },
        destination: LocationInfo {
            city: row.get("destination_city"),
            name: row.get("destination_name"),
            code: row.get("destination_code"),
        },
        departure_date: row.get("departure_date"),
        ready_by: row.get("ready_by"),
        max_weight_kg: row.get("max_weight_kg"),
        price_per_kg: row.get("price_per_kg"),
        currency: row.get("currency"),
        verified: row.get::<i32, _>("verified") != 0,
        type_of_listing: kind,
        urgency: row.get("urgency"),
        owner: OwnerRef {
            id: row.get("owner_id"),
            name: row.get("owner_name"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_db() -> Arc<Database> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database { pool };
        db.migrate().await.unwrap();
        Arc::new(db)
    }

    fn jfk_accra_travel() -> NewListing {
        NewListing {
            title: "5kg spare in checked bag".into(),
            description: "Direct Delta flight, meeting at the airport".into(),
            origin: LocationInfo {
                city: "New York".into(),
                name: "New York (JFK)".into(),
                code: "JFK".into(),
            },
            destination: LocationInfo {
                city: "Accra".into(),
                name: "Kotoka International".into(),
                code: "ACC".into(),
            },
            departure_date: Some("2024-07-04T08:30:00Z".into()),
            ready_by: None,
            max_weight_kg: 5.0,
            price_per_kg: 10.0,
            currency: "USD".into(),
            type_of_listing: ListingKind::Travel,
            urgency: None,
            owner: OwnerRef { id: "u1".into(), name: "Ama".into() },
        }
    }

    fn accra_shipment() -> NewListing {
        NewListing {
            title: "Documents to Washington".into(),
            description: "Small envelope, urgent".into(),
            origin: LocationInfo {
                city: "Accra".into(),
                name: "Kotoka International".into(),
                code: "ACC".into(),
            },
            destination: LocationInfo {
                city: "Washington".into(),
                name: "Washington Dulles (IAD)".into(),
                code: "IAD".into(),
            },
            departure_date: None,
            ready_by: Some("2024-07-01T00:00:00Z".into()),
            max_weight_kg: 1.0,
            price_per_kg: 20.0,
            currency: "GHS".into(),
            type_of_listing: ListingKind::Shipment,
            urgency: Some("high".into()),
            owner: OwnerRef { id: "u2".into(), name: "Kofi".into() },
        }
    }

    #[tokio::test]
    async fn create_then_search_by_code() {
        let db = test_db().await;
        create_listing(db.clone(), jfk_accra_travel()).await.unwrap();
        create_listing(db.clone(), accra_shipment()).await.unwrap();

        let (travellers, shipments) = search_listings(db.clone(), Some("JFK"), Segment::Routes).await.unwrap();
        assert_eq!(travellers.len(), 1);
        assert!(shipments.is_empty());
        assert_eq!(travellers[0].origin.code, "JFK");

        // All segment with no query returns both partitions
        let (travellers, shipments) = search_listings(db, None, Segment::All).await.unwrap();
        assert_eq!(travellers.len(), 1);
        assert_eq!(shipments.len(), 1);
    }

    #[tokio::test]
    async fn segment_filter_is_disjoint() {
        let db = test_db().await;
        create_listing(db.clone(), jfk_accra_travel()).await.unwrap();
        create_listing(db.clone(), accra_shipment()).await.unwrap();

        let (travellers, shipments) = search_listings(db.clone(), None, Segment::Items).await.unwrap();
        assert!(travellers.is_empty());
        assert_eq!(shipments.len(), 1);
        assert_eq!(shipments[0].urgency.as_deref(), Some("high"));
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let db = test_db().await;
        create_listing(db.clone(), jfk_accra_travel()).await.unwrap();
        let (travellers, _) = search_listings(db, Some("jfk"), Segment::All).await.unwrap();
        assert_eq!(travellers.len(), 1);
    }

    #[tokio::test]
    async fn results_sorted_by_date_ascending() {
        let db = test_db().await;
        let mut later = jfk_accra_travel();
        later.departure_date = Some("2024-08-01T08:30:00Z".into());
        let earlier = jfk_accra_travel();
        create_listing(db.clone(), later).await.unwrap();
        create_listing(db.clone(), earlier).await.unwrap();

        let (travellers, _) = search_listings(db, None, Segment::Routes).await.unwrap();
        assert_eq!(travellers.len(), 2);
        assert!(travellers[0].date_epoch_ms() <= travellers[1].date_epoch_ms());
    }

    #[tokio::test]
    async fn only_owner_can_edit() {
        let db = test_db().await;
        let created = create_listing(db.clone(), jfk_accra_travel()).await.unwrap();

        let err = update_listing(
            db.clone(),
            &created.id,
            "someone-else",
            ListingUpdate { title: Some("hijacked".into()), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("owner"));

        let updated = update_listing(
            db.clone(),
            &created.id,
            "u1",
            ListingUpdate { price_per_kg: Some(12.0), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(updated.price_per_kg, 12.0);
    }

    #[tokio::test]
    async fn validation_errors_are_verbatim() {
        let db = test_db().await;
        let mut bad = jfk_accra_travel();
        bad.title = "   ".into();
        let err = create_listing(db.clone(), bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Title is required");

        let mut no_date = jfk_accra_travel();
        no_date.departure_date = None;
        let err = create_listing(db, no_date).await.unwrap_err();
        assert!(err.to_string().contains("departure date"));
    }

    #[tokio::test]
    async fn urgency_dropped_for_travel() {
        let db = test_db().await;
        let mut travel = jfk_accra_travel();
        travel.urgency = Some("high".into());
        let created = create_listing(db, travel).await.unwrap();
        assert!(created.urgency.is_none());
    }
}
