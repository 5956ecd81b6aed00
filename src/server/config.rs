use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Origin allowed by the CORS layer; None means any origin.
    pub allowed_origin: Option<String>,
    pub max_message_length: usize,
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/spaceshare.db".to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            allowed_origin: env::var("ALLOWED_ORIGIN").ok().filter(|v| !v.is_empty()),
            max_message_length: env::var("MAX_MESSAGE_LENGTH").ok().and_then(|v| v.parse().ok()).unwrap_or(2048),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// The realtime channel listens one port above the HTTP API.
    pub fn websocket_port(&self) -> u16 {
        self.port + 1
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_base_url: String,
    pub websocket_host: String,
    pub websocket_port: u16,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            server_base_url: env::var("SERVER_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            websocket_host: env::var("WEBSOCKET_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            websocket_port: env::var("WEBSOCKET_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5001),
        }
    }
}
