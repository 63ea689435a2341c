pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_WATCHLIST_FILE: &str = "watchlist.json";

pub mod adapters;
pub mod application;
pub mod constants;
pub mod domain;
pub mod infrastructure;
