//! LiveTail: bounded in-memory tail of recent events for live queries.
//!
//! The cache starts empty at process start and is not rebuilt from the day
//! store after a restart. Clients detect the gap through the server epoch
//! returned with every live query.

mod cache;

pub use cache::LiveCache;
