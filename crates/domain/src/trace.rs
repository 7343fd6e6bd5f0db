use chrono::{DateTime, Utc};
use serde::Serialize;

/// Structured trace events emitted across all calendar-timer crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TimerArmed {
        name: String,
        refs: usize,
        next: DateTime<Utc>,
    },
    TimerReferenced {
        name: String,
        refs: usize,
    },
    TimerReleased {
        name: String,
        refs: usize,
    },
    TimerRemoved {
        name: String,
    },
    TimerFired {
        name: String,
        expirations: u64,
        deadline: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    },
    TimerExhausted {
        name: String,
    },
    DispatcherStarted {
        timers: usize,
    },
    DispatcherStopped,
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ct_event");
    }
}
