//! Reference-counted pool of calendar timers.
//!
//! Every timer is keyed by its calendar expression. The first reference
//! parses the expression and arms an alarm for the next occurrence; later
//! references only bump the refcount. One dispatcher thread (see
//! [`TimerPool::run`]) sleeps until the earliest alarm or a control signal
//! and reports every expiry to the [`DependencySink`].

mod alarm;
mod dispatcher;

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use ct_calendar::{try_next_occurrence, CalendarDefinition};
use ct_domain::config::PoolConfig;
use ct_domain::sink::DependencySink;
use ct_domain::trace::TraceEvent;
use ct_domain::{Error, Result};

use alarm::Alarm;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timer records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Waiting for its next deadline.
    Armed,
    /// No further occurrence exists; kept until its last reference goes.
    Exhausted,
}

#[derive(Debug)]
struct PooledTimer {
    name: String,
    definition: CalendarDefinition,
    refs: usize,
    alarm: Alarm,
    state: TimerState,
}

impl PooledTimer {
    fn view(&self) -> TimerView {
        TimerView {
            name: self.name.clone(),
            refs: self.refs,
            next: self
                .alarm
                .deadline()
                .and_then(|d| self.definition.civil_time(d)),
            definition: self.definition.to_string(),
            state: self.state,
        }
    }
}

/// Read-only snapshot of one pooled timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerView {
    pub name: String,
    pub refs: usize,
    /// Next deadline in the timer's own offset.
    pub next: Option<DateTime<FixedOffset>>,
    pub definition: String,
    pub state: TimerState,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pool state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
struct PoolState {
    slots: Vec<Option<PooledTimer>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    /// Pending control signals; the dispatcher resets it on wake-up.
    control: u64,
    stopping: bool,
}

impl PoolState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            control: 0,
            stopping: false,
        }
    }

    fn live(&self) -> usize {
        self.index.len()
    }

    fn timers(&self) -> impl Iterator<Item = &PooledTimer> {
        self.slots.iter().flatten()
    }

    fn get(&self, name: &str) -> Option<&PooledTimer> {
        let slot = *self.index.get(name)?;
        self.slots.get(slot)?.as_ref()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut PooledTimer> {
        let slot = *self.index.get(name)?;
        self.slots.get_mut(slot)?.as_mut()
    }

    fn insert(&mut self, timer: PooledTimer) -> usize {
        let name = timer.name.clone();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(timer);
                slot
            }
            None => {
                if self.slots.len() == self.slots.capacity() {
                    tracing::debug!(capacity = self.slots.capacity(), "growing timer pool");
                }
                self.slots.push(Some(timer));
                self.slots.len() - 1
            }
        };
        self.index.insert(name, slot);
        slot
    }

    fn remove(&mut self, name: &str) -> Option<PooledTimer> {
        let slot = self.index.remove(name)?;
        let timer = self.slots.get_mut(slot)?.take();
        self.free.push(slot);
        timer
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TimerPool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Shared {
    state: Mutex<PoolState>,
    wake: Condvar,
    sink: Arc<dyn DependencySink>,
    config: PoolConfig,
}

/// Cheaply cloneable handle to the timer pool.
#[derive(Clone)]
pub struct TimerPool {
    shared: Arc<Shared>,
}

impl TimerPool {
    pub fn new(sink: Arc<dyn DependencySink>, config: PoolConfig) -> Self {
        tracing::info!(
            initial_capacity = config.initial_capacity,
            max_timers = ?config.max_timers,
            "initializing timer pool"
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::with_capacity(config.initial_capacity)),
                wake: Condvar::new(),
                sink,
                config,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.shared.state.lock().map_err(poisoned)
    }

    /// Wake the dispatcher so it re-reads the pool. Caller holds the lock.
    fn signal(&self, state: &mut PoolState) {
        state.control += 1;
        self.shared.wake.notify_all();
    }

    /// Reference the timer for `expression`, creating and arming it on the
    /// first reference. Returns the refcount after the call.
    pub fn add_or_ref(&self, expression: &str) -> Result<usize> {
        self.add_or_ref_at(expression, Utc::now())
    }

    /// [`add_or_ref`](Self::add_or_ref) with an explicit reference time for
    /// the first deadline.
    pub fn add_or_ref_at(&self, expression: &str, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.lock()?;

        if let Some(timer) = state.get_mut(expression) {
            timer.refs += 1;
            let refs = timer.refs;
            TraceEvent::TimerReferenced {
                name: expression.to_string(),
                refs,
            }
            .emit();
            self.signal(&mut state);
            return Ok(refs);
        }

        if let Some(max) = self.shared.config.max_timers {
            if state.live() >= max {
                tracing::error!(timer = %expression, capacity = max, "timer pool is full");
                return Err(Error::PoolFull { capacity: max });
            }
        }

        let definition: CalendarDefinition = expression.parse().map_err(|e| {
            tracing::error!(timer = %expression, error = %e, "rejecting timer expression");
            Error::Parse(e)
        })?;
        let next = try_next_occurrence(expression, now, &definition)?;

        let slot = state.insert(PooledTimer {
            name: expression.to_string(),
            definition,
            refs: 1,
            alarm: Alarm::armed(next),
            state: TimerState::Armed,
        });
        tracing::debug!(timer = %expression, slot, definition = %definition, "timer inserted");
        TraceEvent::TimerArmed {
            name: expression.to_string(),
            refs: 1,
            next,
        }
        .emit();
        self.signal(&mut state);
        Ok(1)
    }

    /// Drop one reference to `expression`; the timer and its alarm are
    /// released when the last reference goes. Returns `false` for names
    /// that are not in the pool.
    pub fn deref_or_remove(&self, expression: &str) -> Result<bool> {
        let mut state = self.lock()?;

        let Some(timer) = state.get_mut(expression) else {
            tracing::debug!(timer = %expression, "deref of unknown timer ignored");
            return Ok(false);
        };
        timer.refs = timer.refs.saturating_sub(1);
        let refs = timer.refs;

        if refs == 0 {
            state.remove(expression);
            TraceEvent::TimerRemoved {
                name: expression.to_string(),
            }
            .emit();
        } else {
            TraceEvent::TimerReleased {
                name: expression.to_string(),
                refs,
            }
            .emit();
        }
        self.signal(&mut state);
        Ok(true)
    }

    /// Current refcount of `expression`, if pooled.
    pub fn refs(&self, expression: &str) -> Result<Option<usize>> {
        let state = self.lock()?;
        Ok(state.get(expression).map(|t| t.refs))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.live())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// One view per live timer, in slot order.
    pub fn snapshot(&self) -> Result<Vec<TimerView>> {
        Ok(self.lock()?.timers().map(PooledTimer::view).collect())
    }

    /// Log the pool contents: a summary at `info`, one line per timer at
    /// `debug`.
    pub fn log_pool(&self) -> Result<()> {
        let state = self.lock()?;
        tracing::info!(
            size = state.live(),
            slots = state.slots.len(),
            capacity = state.slots.capacity(),
            "timer pool"
        );
        for (slot, timer) in state.slots.iter().enumerate() {
            if let Some(timer) = timer {
                let view = timer.view();
                tracing::debug!(
                    slot,
                    timer = %view.name,
                    refs = view.refs,
                    next = ?view.next,
                    state = ?view.state,
                    definition = %view.definition,
                    "pooled timer"
                );
            }
        }
        Ok(())
    }

    /// Start the dispatcher on a dedicated, named OS thread.
    pub fn spawn(&self) -> Result<JoinHandle<()>> {
        self.log_pool()?;
        let pool = self.clone();
        std::thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || {
                if let Err(e) = pool.run() {
                    tracing::error!(error = %e, "timer dispatcher stopped");
                }
            })
            .map_err(|e| Error::Resource(format!("spawning timer dispatcher: {e}")))
    }

    /// Ask a running dispatcher to return.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.stopping = true;
        self.signal(&mut state);
        Ok(())
    }
}

fn poisoned<T>(e: PoisonError<T>) -> Error {
    tracing::error!("timer pool mutex poisoned");
    Error::PoolCorruption(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pool() -> TimerPool {
        let sink = |_: &str, _: &str| -> Result<()> { Ok(()) };
        TimerPool::new(Arc::new(sink), PoolConfig::default())
    }

    #[test]
    fn freed_slots_are_reused() {
        let pool = pool();
        pool.add_or_ref("daily").unwrap();
        pool.add_or_ref("hourly").unwrap();
        pool.deref_or_remove("daily").unwrap();
        pool.add_or_ref("weekly").unwrap();

        let state = pool.lock().unwrap();
        assert_eq!(state.slots.len(), 2);
        assert_eq!(state.index["weekly"], 0);
        assert_eq!(state.index["hourly"], 1);
    }

    #[test]
    fn mutations_signal_the_dispatcher() {
        let pool = pool();
        pool.add_or_ref("daily").unwrap();
        pool.add_or_ref("daily").unwrap();
        pool.deref_or_remove("daily").unwrap();
        assert_eq!(pool.lock().unwrap().control, 3);
    }

    #[test]
    fn unknown_deref_does_not_signal() {
        let pool = pool();
        assert!(!pool.deref_or_remove("never-added").unwrap());
        assert_eq!(pool.lock().unwrap().control, 0);
    }

    #[test]
    fn snapshot_reports_deadline_in_timer_offset() {
        let pool = pool();
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap();
        pool.add_or_ref_at("*-*-*-09:00:00+0100", now).unwrap();

        let views = pool.snapshot().unwrap();
        assert_eq!(views.len(), 1);
        let next = views[0].next.unwrap();
        assert_eq!(next.to_rfc3339(), "2025-03-03T09:00:00+01:00");
        assert_eq!(views[0].state, TimerState::Armed);
        assert_eq!(views[0].refs, 1);
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let pool = pool();
        let clone = pool.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.shared.state.lock().unwrap();
            panic!("poison the pool");
        })
        .join();

        assert!(matches!(
            pool.add_or_ref("daily"),
            Err(Error::PoolCorruption(_))
        ));
    }
}
