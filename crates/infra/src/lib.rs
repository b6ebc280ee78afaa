//! Infrastructure layer: configuration, storage backends, the settlement
//! engine and the application services built on top of them.

pub mod config;
pub mod db;
pub mod error;
pub mod reports;
pub mod services;
pub mod settlement;
pub mod store;
pub mod transaction;

mod integration_tests;

pub use config::{AppConfig, ConfigError, DatabaseConfig, StorageBackend};
pub use error::{ServiceError, StoreError, StoreResult};
pub use services::Services;
pub use settlement::{BulkCoordinator, SettlementEngine};
pub use store::{MemoryStore, PgStore, Storage};
