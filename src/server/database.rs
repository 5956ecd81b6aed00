use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        log::info!("[DB] Connecting to database: {}", database_url);

        // Extract file path from database URL to create the directory if needed
        let file_path = if let Some(rest) = database_url.strip_prefix("sqlite://") {
            rest.split('?').next().unwrap_or(rest)
        } else if let Some(rest) = database_url.strip_prefix("sqlite:") {
            rest.split('?').next().unwrap_or(rest)
        } else {
            database_url
        };

        if file_path != ":memory:" {
            if let Some(parent) = std::path::Path::new(file_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
                    log::info!("[DB] Created data directory: {:?}", parent);
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| {
                log::error!("[DB] SQLite connection failed: {}", e);
                e
            })?;

        log::info!("[DB] Database connection successful");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        // Listings
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                origin_city TEXT NOT NULL,
                origin_name TEXT NOT NULL,
                origin_code TEXT NOT NULL,
                destination_city TEXT NOT NULL,
                destination_name TEXT NOT NULL,
                destination_code TEXT NOT NULL,
                departure_date TEXT,
                ready_by TEXT,
                max_weight_kg REAL NOT NULL,
                price_per_kg REAL NOT NULL,
                currency TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                kind TEXT NOT NULL,
                urgency TEXT,
                owner_id TEXT NOT NULL,
                owner_name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Locations for the lookup endpoint
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS locations (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Conversation messages, keyed by thread
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        "#).execute(&self.pool).await?;

        sqlx::query(r#"
            CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages (thread_id, created_at);
        "#).execute(&self.pool).await?;

        sqlx::query(r#"
            CREATE INDEX IF NOT EXISTS idx_listings_kind ON listings (kind);
        "#).execute(&self.pool).await?;

        Ok(())
    }
}
