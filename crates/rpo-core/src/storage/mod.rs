//! Storage abstraction layer.
//!
//! The ingested history lives behind the [`HistoryStore`] trait; SQLite is
//! the only backend.

mod sqlite;
mod traits;

pub use sqlite::SqliteHistoryStore;
pub use traits::{BatchOutcome, HistoryStore};
