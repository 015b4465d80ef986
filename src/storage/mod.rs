pub mod postgres;
pub mod sqlite;
pub mod trait_def;

mod rows;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{AnalyticsStore, LinkStore, StorageError, StorageResult};

/// Identifiers below this are skipped so codes start at three characters.
pub const DEFAULT_ID_FLOOR: u64 = 100_000;
