// src/lib.rs
pub mod cli;
pub mod clock;
pub mod config;
mod event;
mod handler;
pub mod livetail;
pub mod native;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use config::{Config, LogFormat};
pub use event::{Event, MachineReport, DEFAULT_MACHINE_ID, DEFAULT_STATE, MAX_EVENTS};

// Re-export tracing for use in other modules
pub use tracing;

// Re-export for tests
pub use handler::{HandleError, History, IngestReceipt, StateService};
pub use native::build_router;
pub use store::{DayStore, FileDayStore, StoreError};
