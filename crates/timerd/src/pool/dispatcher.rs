//! The dispatcher loop: sleep until a control signal or the earliest
//! alarm, then fire every expired timer in slot order.
//!
//! Deadlines are wall-clock instants. Sleeps are capped at
//! [`CLOCK_POLL`] so a step of the system clock is noticed within that
//! period.

use std::sync::MutexGuard;
use std::time::Duration;

use chrono::Utc;

use ct_calendar::next_occurrence;
use ct_domain::sink::TIMER_DEPENDENCY;
use ct_domain::trace::TraceEvent;
use ct_domain::Result;

use super::{poisoned, PoolState, TimerPool, TimerState};

/// Longest single sleep while any alarm is pending.
const CLOCK_POLL: Duration = Duration::from_secs(1);

impl TimerPool {
    /// Run the dispatcher on the current thread until [`shutdown`] is
    /// called. Normally started through [`spawn`].
    ///
    /// The pool lock is released only while waiting; each batch of
    /// expired timers is dispatched with the lock held.
    ///
    /// [`shutdown`]: TimerPool::shutdown
    /// [`spawn`]: TimerPool::spawn
    pub fn run(&self) -> Result<()> {
        let mut state = self.lock()?;
        TraceEvent::DispatcherStarted {
            timers: state.live(),
        }
        .emit();

        loop {
            if state.stopping {
                break;
            }
            if state.control > 0 {
                tracing::trace!(signals = state.control, "timer pool changed");
                state.control = 0;
                continue;
            }

            let now = Utc::now();
            let expired: Vec<usize> = state
                .slots
                .iter_mut()
                .enumerate()
                .filter_map(|(slot, timer)| {
                    let timer = timer.as_mut()?;
                    timer.alarm.check(now).then_some(slot)
                })
                .collect();

            if expired.is_empty() {
                state = self.wait(state)?;
                continue;
            }

            for slot in expired {
                self.fire(&mut state, slot);
            }
        }

        TraceEvent::DispatcherStopped.emit();
        Ok(())
    }

    /// Block until notified, until the earliest alarm is due, or for at
    /// most [`CLOCK_POLL`].
    fn wait<'a>(&self, state: MutexGuard<'a, PoolState>) -> Result<MutexGuard<'a, PoolState>> {
        let now = Utc::now();
        let earliest = state.timers().filter_map(|t| t.alarm.remaining(now)).min();
        match earliest {
            Some(remaining) => {
                let (state, _) = self
                    .shared
                    .wake
                    .wait_timeout(state, remaining.min(CLOCK_POLL))
                    .map_err(poisoned)?;
                Ok(state)
            }
            None => self.shared.wake.wait(state).map_err(poisoned),
        }
    }

    fn fire(&self, state: &mut PoolState, slot: usize) {
        let Some(timer) = state.slots.get_mut(slot).and_then(Option::as_mut) else {
            return;
        };
        let expirations = timer.alarm.drain();
        let Some(deadline) = timer.alarm.deadline() else {
            return;
        };
        tracing::debug!(timer = %timer.name, %deadline, expirations, "timer expired");

        if let Err(e) = self.shared.sink.fulfill(TIMER_DEPENDENCY, &timer.name) {
            tracing::error!(
                timer = %timer.name,
                error = %e,
                "failed to fulfil timer dependency"
            );
        }

        let next = next_occurrence(deadline, &timer.definition);
        match next {
            Some(next) => {
                timer.alarm.arm(next);
                timer.state = TimerState::Armed;
            }
            None => {
                timer.alarm.disarm();
                timer.state = TimerState::Exhausted;
                tracing::warn!(
                    timer = %timer.name,
                    definition = %timer.definition,
                    "timer has no further occurrence"
                );
                TraceEvent::TimerExhausted {
                    name: timer.name.clone(),
                }
                .emit();
            }
        }

        TraceEvent::TimerFired {
            name: timer.name.clone(),
            expirations,
            deadline,
            next,
        }
        .emit();
    }
}
