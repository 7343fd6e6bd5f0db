//! [`DependencySink`] implementations shipped with the daemon.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tokio::sync::mpsc;

use ct_domain::sink::DependencySink;
use ct_domain::{Error, Result};

/// A dependency fulfilment as seen by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fulfilment {
    pub dependency: String,
    pub event: String,
    pub at: DateTime<Utc>,
}

impl Fulfilment {
    fn now(dependency: &str, event: &str) -> Self {
        Self {
            dependency: dependency.to_string(),
            event: event.to_string(),
            at: Utc::now(),
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────────

/// Logs every fulfilment and otherwise does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl DependencySink for LoggingSink {
    fn fulfill(&self, dependency: &str, event: &str) -> Result<()> {
        tracing::info!(dependency, event, "dependency fulfilled");
        Ok(())
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// Forwards fulfilments to an async consumer.
///
/// Sending never blocks, so it is safe to call from the dispatcher thread
/// with the pool lock held.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Fulfilment>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fulfilment>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DependencySink for ChannelSink {
    fn fulfill(&self, dependency: &str, event: &str) -> Result<()> {
        self.tx
            .send(Fulfilment::now(dependency, event))
            .map_err(|_| Error::Sink("fulfilment receiver dropped".into()))
    }
}

// ── Recording ────────────────────────────────────────────────────────

/// Keeps every fulfilment in memory; lets a caller wait for a count.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Fulfilment>>,
    changed: Condvar,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fulfilments(&self) -> Vec<Fulfilment> {
        self.seen.lock().clone()
    }

    /// Events recorded so far, in order.
    pub fn events(&self) -> Vec<String> {
        self.seen.lock().iter().map(|f| f.event.clone()).collect()
    }

    /// Wait until at least `count` fulfilments were recorded. Returns
    /// `false` on timeout.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut seen = self.seen.lock();
        while seen.len() < count {
            if self.changed.wait_until(&mut seen, deadline).timed_out() {
                return seen.len() >= count;
            }
        }
        true
    }
}

impl DependencySink for RecordingSink {
    fn fulfill(&self, dependency: &str, event: &str) -> Result<()> {
        self.seen.lock().push(Fulfilment::now(dependency, event));
        self.changed.notify_all();
        Ok(())
    }
}
