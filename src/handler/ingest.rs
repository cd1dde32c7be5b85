use std::sync::Arc;
use tracing::{debug, error, info, Span};

use super::StateService;
use crate::event::{Event, MachineReport};
use crate::store::{DayStore, StoreError};

/// Outcome of accepting one report.
///
/// Receipt is always acknowledged. A failed durable write is carried here so
/// callers can log or count it, but the event stays visible in the live cache.
#[derive(Debug)]
pub struct IngestReceipt {
    pub event: Event,
    pub persistence_error: Option<StoreError>,
}

impl IngestReceipt {
    pub fn is_persisted(&self) -> bool {
        self.persistence_error.is_none()
    }
}

impl<S: DayStore> StateService<S> {
    /// Accept a normalized report, stamped with the server's receive time.
    #[tracing::instrument(
        name = "ingest",
        skip(self, report),
        fields(
            machine_id = %report.machine_id,
            state = report.state,
            persisted = tracing::field::Empty,
        )
    )]
    pub async fn receive(&self, report: &MachineReport) -> IngestReceipt {
        let event = Event::recorded(self.now_seconds(), report.state, report.machine_id.clone());
        let receipt = self.record(event).await;
        info!(
            machine_id = %receipt.event.machine_id,
            state = receipt.event.state,
            "state received"
        );
        receipt
    }

    /// Inject a state directly, bypassing payload parsing. Only reachable
    /// when debug routes are enabled.
    #[tracing::instrument(
        name = "force_inject",
        skip(self, machine_id),
        fields(
            machine_id = %machine_id,
            persisted = tracing::field::Empty,
        )
    )]
    pub async fn force_inject(&self, machine_id: &str, state: i64) -> IngestReceipt {
        let event = Event::recorded(self.now_seconds(), state, machine_id);
        let receipt = self.record(event).await;
        info!(machine_id, state, "state forced");
        receipt
    }

    /// Dual write: live cache first, then today's partition. Not atomic; a
    /// crash in between leaves the event only in the cache.
    ///
    /// The partition write runs as its own task, so it completes even when
    /// the caller is dropped after the cache append.
    async fn record(&self, event: Event) -> IngestReceipt {
        self.cache.append(event.clone());

        let day = self.clock.today();
        let store = Arc::clone(&self.store);
        let stored = event.clone();
        let write = tokio::spawn(async move { store.append(day, &stored).await });

        let result = match write.await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Join(e.to_string())),
        };
        let persistence_error = match result {
            Ok(()) => {
                debug!(%day, "event persisted");
                None
            }
            Err(e) => {
                error!(%day, error = %e, "persistence failure, event kept in live cache only");
                Some(e)
            }
        };

        Span::current().record("persisted", persistence_error.is_none());

        IngestReceipt {
            event,
            persistence_error,
        }
    }
}
