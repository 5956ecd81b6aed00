// src/server/main.rs
// Entry point for the spaceshare marketplace server
use spaceshare::server::channel::ChatChannelManager;
use spaceshare::server::http::{self, ApiState};
use spaceshare::server::locations;
use spaceshare::server::{config::ServerConfig, database::Database};
use std::sync::Arc;
use tokio::net::TcpListener;
use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    std::env::set_var("RUST_LOG", &log_level);
    env_logger::init();

    let config = ServerConfig::from_env();

    let database = Arc::new(Database::connect(&config.database_url).await?);

    info!("🗄️ Running database migrations...");
    database.migrate().await.map_err(|e| {
        error!("Database migration failed: {}", e);
        e
    })?;
    locations::seed_locations(database.clone()).await?;
    info!("✅ Database ready");

    // Realtime channel manager with Redis fan-out between instances
    let channel_manager = Arc::new(ChatChannelManager::new(&config.redis_url).await?);
    channel_manager.start_redis_subscriber().await?;

    // WebSocket listener one port above the HTTP API
    let ws_addr = format!("{}:{}", config.host, config.websocket_port());
    let ws_manager = channel_manager.clone();
    let ws_database = database.clone();
    let ws_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = run_websocket_server(&ws_addr, ws_manager, ws_database, ws_config).await {
            error!("WebSocket server error: {}", e);
        }
    });
    info!("WebSocket server started on {}:{}", config.host, config.websocket_port());

    // HTTP API
    let state = ApiState { db: database, config: config.clone() };
    let app = http::router(state);
    let http_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP API listening on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_websocket_server(
    addr: &str,
    channel_manager: Arc<ChatChannelManager>,
    database: Arc<Database>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on {}", addr);

    while let Ok((stream, peer)) = listener.accept().await {
        info!("New WebSocket connection from {}", peer);
        let channel_manager = channel_manager.clone();
        let database = database.clone();
        let config = config.clone();

        tokio::spawn(async move {
            match tokio_tungstenite::accept_async(stream).await {
                Ok(ws_stream) => {
                    if let Err(e) = channel_manager.handle_connection(ws_stream, database, config).await {
                        error!("Error handling WebSocket connection: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error during WebSocket handshake: {}", e);
                }
            }
        });
    }

    Ok(())
}
