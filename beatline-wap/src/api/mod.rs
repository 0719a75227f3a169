//! API endpoint handlers

pub mod events;
pub mod health;
pub mod ingest;
pub mod logs;
pub mod wap;

pub use events::read_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
pub use logs::log_routes;
pub use wap::wap_routes;
