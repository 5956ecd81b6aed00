pub mod listing_filters;
pub mod live_channel;
pub mod search_service;
