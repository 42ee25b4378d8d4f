pub mod batch;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod stores;

pub use batch::FinalizationBatch;
pub use config::DatabaseConfig;
pub use error::DatabaseError;
pub use models::{GameDocument, KillDocument};
pub use retry::retry_with_backoff;
pub use stores::{GameStore, LeaderboardStore, MemoryStore, RosterStore, SqliteStore, Store};
