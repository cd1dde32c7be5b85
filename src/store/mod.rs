//! Durable day store: one partition of events per server-local calendar day.

mod file;

pub use file::FileDayStore;

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::event::Event;

/// Date format of partition keys and file stems.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Errors from reading or writing day partitions
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A partition exists but is not a JSON array of events.
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The blocking file task panicked or was cancelled.
    Join(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "io error on {}: {}", path.display(), source)
            }
            StoreError::Corrupt { path, source } => {
                write!(f, "corrupt partition {}: {}", path.display(), source)
            }
            StoreError::Join(e) => write!(f, "store task failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Corrupt { source, .. } => Some(source),
            StoreError::Join(_) => None,
        }
    }
}

/// Trait for persisting events by day (abstracts the storage backend)
#[async_trait::async_trait]
pub trait DayStore: Send + Sync + 'static {
    /// Append `event` to the partition for `day`, creating it if needed.
    async fn append(&self, day: NaiveDate, event: &Event) -> Result<(), StoreError>;

    /// All events stored for `day` in append order. A missing partition is
    /// an empty history, not an error.
    async fn read(&self, day: NaiveDate) -> Result<Vec<Event>, StoreError>;

    /// Dates that have a partition, ascending.
    async fn days(&self) -> Result<Vec<NaiveDate>, StoreError>;
}

/// Parse a `YYYY-MM-DD` partition key. Anything else, including strings with
/// path separators, is `None`.
pub fn parse_day(date_str: &str) -> Option<NaiveDate> {
    if date_str.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date_str, DAY_FORMAT).ok()
}

/// Partition key for `day`.
pub fn day_key(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}
