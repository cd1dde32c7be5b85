use chrono::NaiveDate;
use tracing::{debug, error};

use super::{HandleError, History, StateService};
use crate::event::Event;
use crate::store::{parse_day, DayStore};

impl<S: DayStore> StateService<S> {
    /// Cached events for a machine, extended to now by a live sentinel.
    ///
    /// A machine with nothing in the cache gets an empty list and no
    /// sentinel, since there is no last state to extend.
    pub fn live_history(&self, machine_id: &str) -> History {
        let mut events = self.cache.filter_by_machine(machine_id);

        if let Some(last) = events.last() {
            let sentinel = Event::sentinel(self.now_seconds(), last);
            events.push(sentinel);
        }

        debug!(machine_id, events = events.len(), "live history");
        self.history(machine_id, events)
    }

    /// Stored events for a machine on `date_str` (`YYYY-MM-DD`).
    ///
    /// Malformed dates and missing partitions both answer with an empty list.
    /// Only a partition that exists but cannot be read is an error.
    #[tracing::instrument(name = "day_history", skip(self))]
    pub async fn day_history(
        &self,
        machine_id: &str,
        date_str: &str,
    ) -> Result<History, HandleError> {
        let Some(day) = parse_day(date_str) else {
            debug!("malformed date, no partition");
            return Ok(self.history(machine_id, Vec::new()));
        };

        let events = self
            .store
            .read(day)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to read day partition");
                HandleError::StorageCorruption(e)
            })?
            .into_iter()
            .filter(|e| e.machine_id == machine_id)
            .map(|e| Event { live: false, ..e })
            .collect();

        Ok(self.history(machine_id, events))
    }

    /// Dates with a stored partition, ascending.
    pub async fn days(&self) -> Result<Vec<NaiveDate>, HandleError> {
        self.store.days().await.map_err(|e| {
            error!(error = %e, "failed to list day partitions");
            HandleError::StorageCorruption(e)
        })
    }

    fn history(&self, machine_id: &str, events: Vec<Event>) -> History {
        History {
            server_start: self.server_epoch,
            machine_id: machine_id.to_string(),
            events,
        }
    }
}
