//! Machine state events and report coercion.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Capacity of the live tail cache across all machines.
pub const MAX_EVENTS: usize = 10_000;

/// Machine id used when a report does not carry one.
pub const DEFAULT_MACHINE_ID: &str = "UNKNOWN";

/// State used when a report does not carry a usable one.
pub const DEFAULT_STATE: i64 = 0;

/// One reported (timestamp, state, machine) tuple.
///
/// `live` is only set on sentinels synthesized for live queries and is never
/// written to a day partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch, UTC, fractional.
    pub ts: f64,
    pub state: i64,
    pub machine_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub live: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Event {
    pub fn recorded(ts: f64, state: i64, machine_id: impl Into<String>) -> Self {
        Self {
            ts,
            state,
            machine_id: machine_id.into(),
            live: false,
        }
    }

    /// Extend `last` to `ts`: same machine and state, flagged live.
    pub fn sentinel(ts: f64, last: &Event) -> Self {
        Self {
            ts,
            state: last.state,
            machine_id: last.machine_id.clone(),
            live: true,
        }
    }
}

/// A normalized state report from a remote machine.
///
/// Built from arbitrary JSON; missing or unusable fields fall back to
/// [`DEFAULT_STATE`] and [`DEFAULT_MACHINE_ID`] instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineReport {
    pub state: i64,
    pub machine_id: String,
}

impl Default for MachineReport {
    fn default() -> Self {
        Self {
            state: DEFAULT_STATE,
            machine_id: DEFAULT_MACHINE_ID.to_string(),
        }
    }
}

impl MachineReport {
    /// Parse a raw request body. Invalid JSON yields the defaults.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                tracing::debug!(error = %e, "report body is not JSON, using defaults");
                Self::default()
            }
        }
    }

    /// Coerce `state` and `machine_id` out of a JSON value. Any other field,
    /// including a client supplied timestamp, is ignored.
    pub fn from_json(value: &JsonValue) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let state = obj.get("state").and_then(coerce_state).unwrap_or(DEFAULT_STATE);
        let machine_id = obj
            .get("machine_id")
            .and_then(coerce_machine_id)
            .unwrap_or_else(|| DEFAULT_MACHINE_ID.to_string());

        Self { state, machine_id }
    }
}

fn coerce_state(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            // Floats truncate toward zero; NaN and out of range values are rejected.
            let f = n.as_f64()?;
            if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(f.trunc() as i64)
            } else {
                None
            }
        }),
        JsonValue::Bool(b) => Some(i64::from(*b)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_machine_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
