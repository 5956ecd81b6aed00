pub mod channel;
pub mod config;
pub mod database;
pub mod http;
pub mod listings;
pub mod locations;
pub mod messages;
