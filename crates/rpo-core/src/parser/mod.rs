//! Parsers for the text streams produced by the version-control tool.

pub mod blame;
pub mod listing;
pub mod log;

pub use blame::{BlameHunks, BlameTraceParser};
pub use listing::{parse_file_listing, FileEntry};
pub use log::{LogFormat, LogRecordParser, LogRecords, StreamOrder};
