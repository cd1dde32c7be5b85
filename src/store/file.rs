//! JSON file per day: `<data_dir>/YYYY-MM-DD.json` holding an array of events.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{day_key, parse_day, DayStore, StoreError};
use crate::event::Event;

/// Day store backed by one JSON document per date.
///
/// Appends rewrite the whole partition through a temp file that is renamed
/// over the old one, so readers see either the previous or the new content.
/// Appends to the same date are serialized; different dates do not contend.
pub struct FileDayStore {
    dir: PathBuf,
    partition_locks: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileDayStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            partition_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the partition file for `day`.
    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", day_key(day)))
    }

    fn partition_lock(&self, day: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .partition_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(day).or_default())
    }
}

#[async_trait::async_trait]
impl DayStore for FileDayStore {
    #[tracing::instrument(
        name = "store_append",
        skip(self, day, event),
        fields(day = %day, machine_id = %event.machine_id)
    )]
    async fn append(&self, day: NaiveDate, event: &Event) -> Result<(), StoreError> {
        // The guard moves into the blocking task so a dropped caller cannot
        // release the partition while its rewrite is still running.
        let guard = self.partition_lock(day).lock_owned().await;

        let dir = self.dir.clone();
        let path = self.partition_path(day);
        let event = Event {
            live: false,
            ..event.clone()
        };

        let count = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            append_blocking(&dir, &path, event)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        debug!(events = count, "partition written");
        Ok(())
    }

    async fn read(&self, day: NaiveDate) -> Result<Vec<Event>, StoreError> {
        let path = self.partition_path(day);
        tokio::task::spawn_blocking(move || read_partition(&path))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn days(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || list_days(&dir))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn read_partition(path: &Path) -> Result<Vec<Event>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes).map_err(|source| {
        warn!(path = %path.display(), error = %source, "partition is corrupt");
        StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read-modify-write one partition. Returns the new event count.
fn append_blocking(dir: &Path, path: &Path, event: Event) -> Result<usize, StoreError> {
    let mut events = read_partition(path)?;
    events.push(event);

    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_vec(&events).map_err(|e| io_err(e.into()))?;

    // Temp file must live in the same directory for the rename to be atomic.
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(events.len())
}

fn list_days(dir: &Path) -> Result<Vec<NaiveDate>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut days: Vec<NaiveDate> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            parse_day(name.strip_suffix(".json")?)
        })
        .collect();
    days.sort();
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[tokio::test]
    async fn test_read_missing_partition_is_empty() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let events = store.read(day("2099-01-01")).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("nested").join("data");
        let store = FileDayStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_append_then_read_round_trip() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");

        let first = Event::recorded(1714567890.123456, 1, "M1");
        let second = Event::recorded(1714567891.5, 0, "M2");
        store.append(d, &first).await.unwrap();
        store.append(d, &second).await.unwrap();

        let events = store.read(d).await.unwrap();
        assert_eq!(events, vec![first, second]);
    }

    #[tokio::test]
    async fn test_nanosecond_timestamps_read_back_exactly() {
        use crate::clock::epoch_seconds;
        use chrono::{TimeZone, Utc};

        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2025-10-09");

        let base = Utc.with_ymd_and_hms(2025, 10, 9, 8, 53, 20).unwrap();
        let written: Vec<Event> = (0..2_000i64)
            .map(|i| {
                let at = base
                    + chrono::Duration::seconds(i)
                    + chrono::Duration::nanoseconds(i * 7_919_731 % 1_000_000_000);
                Event::recorded(epoch_seconds(at), 1, "M1")
            })
            .collect();
        let body = serde_json::to_vec(&written[..written.len() - 1]).unwrap();
        std::fs::write(store.partition_path(d), body).unwrap();
        store.append(d, written.last().unwrap()).await.unwrap();

        let read = store.read(d).await.unwrap();
        assert_eq!(read.len(), written.len());
        for (got, want) in read.iter().zip(&written) {
            assert_eq!(got.ts.to_bits(), want.ts.to_bits(), "{} != {}", got.ts, want.ts);
        }
    }

    #[tokio::test]
    async fn test_partition_file_layout() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");
        store.append(d, &Event::recorded(2.5, 3, "M1")).await.unwrap();

        let path = temp.path().join("2024-05-01.json");
        assert_eq!(store.partition_path(d), path);
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!([{"ts": 2.5, "state": 3, "machine_id": "M1"}])
        );
    }

    #[tokio::test]
    async fn test_live_flag_never_persisted() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");
        let sentinel = Event::sentinel(9.0, &Event::recorded(1.0, 4, "M1"));
        store.append(d, &sentinel).await.unwrap();

        let text = std::fs::read_to_string(store.partition_path(d)).unwrap();
        assert!(!text.contains("live"));
        assert!(!store.read(d).await.unwrap()[0].live);
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        store
            .append(day("2024-05-01"), &Event::recorded(1.0, 1, "M1"))
            .await
            .unwrap();
        store
            .append(day("2024-05-02"), &Event::recorded(2.0, 2, "M1"))
            .await
            .unwrap();

        assert_eq!(store.read(day("2024-05-01")).await.unwrap().len(), 1);
        assert_eq!(store.read(day("2024-05-02")).await.unwrap()[0].state, 2);
    }

    #[tokio::test]
    async fn test_corrupt_partition_fails_read_and_append() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");
        std::fs::write(store.partition_path(d), b"[{\"ts\": 1.0, \"sta").unwrap();

        let err = store.read(d).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        let err = store
            .append(d, &Event::recorded(2.0, 1, "M1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // The damaged file is left for inspection rather than overwritten.
        let raw = std::fs::read(store.partition_path(d)).unwrap();
        assert_eq!(raw, b"[{\"ts\": 1.0, \"sta");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");
        std::fs::write(store.partition_path(d), b"{\"events\": []}").unwrap();

        assert!(matches!(
            store.read(d).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_days_lists_partitions_sorted() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        for d in ["2024-05-03", "2024-05-01", "2024-05-02"] {
            store.append(day(d), &Event::recorded(1.0, 1, "M1")).await.unwrap();
        }
        std::fs::write(temp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(temp.path().join("garbage.json"), b"[]").unwrap();

        let days = store.days().await.unwrap();
        assert_eq!(
            days,
            vec![day("2024-05-01"), day("2024-05-02"), day("2024-05-03")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_same_day_are_not_lost() {
        let temp = tempdir().unwrap();
        let store = Arc::new(FileDayStore::open(temp.path()).unwrap());
        let d = day("2024-05-01");

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .append(d, &Event::recorded(i as f64, i, "M1"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut states: Vec<i64> = store.read(d).await.unwrap().iter().map(|e| e.state).collect();
        states.sort();
        assert_eq!(states, (0..40).collect::<Vec<i64>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_append_still_holds_partition() {
        let temp = tempdir().unwrap();
        let store = FileDayStore::open(temp.path()).unwrap();
        let d = day("2024-05-01");

        let seeded: Vec<Event> = (0..50_000)
            .map(|i| Event::recorded(i as f64, 0, "SEED"))
            .collect();
        std::fs::write(store.partition_path(d), serde_json::to_vec(&seeded).unwrap()).unwrap();

        // A zero timeout polls the append once, far enough to start the
        // rewrite, then drops it.
        let first = Event::recorded(60_000.0, 1, "M1");
        let _ = tokio::time::timeout(std::time::Duration::ZERO, store.append(d, &first)).await;

        let second = Event::recorded(60_001.0, 2, "M1");
        store.append(d, &second).await.unwrap();

        let events = store.read(d).await.unwrap();
        assert_eq!(events.len(), seeded.len() + 2);
        assert!(events.contains(&first));
        assert_eq!(events.last(), Some(&second));
    }
}
