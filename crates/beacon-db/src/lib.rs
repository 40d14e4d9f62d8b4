pub mod config;
pub mod database;
pub mod queue_backend;

pub use config::DatabaseConfig;
pub use database::Database;
pub use queue_backend::PgQueueBackend;
