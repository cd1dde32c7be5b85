//! Ingest and query services over the live cache and the day store.

use serde::Serialize;
use std::sync::Arc;

use crate::clock::{epoch_seconds, Clock, SystemClock};
use crate::event::{Event, MAX_EVENTS};
use crate::livetail::LiveCache;
use crate::store::{DayStore, StoreError};

mod ingest;
mod query;

pub use ingest::IngestReceipt;

#[derive(Debug)]
pub enum HandleError {
    /// A stored partition exists but could not be read back.
    StorageCorruption(StoreError),
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleError::StorageCorruption(e) => write!(f, "storage corruption: {}", e),
        }
    }
}

impl std::error::Error for HandleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandleError::StorageCorruption(e) => Some(e),
        }
    }
}

/// Response body of both history queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    /// Process start, seconds since the epoch. Changes when the server
    /// restarts and the live cache is reset.
    pub server_start: f64,
    pub machine_id: String,
    pub events: Vec<Event>,
}

/// Process-wide state service. Constructed once at startup and shared with
/// request handlers behind an `Arc`.
pub struct StateService<S> {
    cache: LiveCache,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    server_epoch: f64,
}

impl<S: DayStore> StateService<S> {
    pub fn new(store: S) -> Self {
        Self::with_capacity(store, MAX_EVENTS)
    }

    pub fn with_capacity(store: S, capacity: usize) -> Self {
        Self::with_clock(store, capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let server_epoch = epoch_seconds(clock.now());
        Self {
            cache: LiveCache::new(capacity),
            store: Arc::new(store),
            clock,
            server_epoch,
        }
    }

    pub fn cache(&self) -> &LiveCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn server_epoch(&self) -> f64 {
        self.server_epoch
    }

    fn now_seconds(&self) -> f64 {
        epoch_seconds(self.clock.now())
    }
}
