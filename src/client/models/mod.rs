pub mod conversation;
pub mod search_state;
