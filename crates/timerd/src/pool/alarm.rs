//! One-shot alarm backing a single pooled timer.
//!
//! The deadline is an absolute wall-clock instant and expiry is always
//! judged against the current wall clock, so a clock step moves every
//! alarm with it. A deadline in the past is due immediately.

use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub(crate) struct Alarm {
    deadline: Option<DateTime<Utc>>,
    pending: bool,
    expirations: u64,
}

impl Alarm {
    pub fn armed(deadline: DateTime<Utc>) -> Self {
        let mut alarm = Self::default();
        alarm.arm(deadline);
        alarm
    }

    /// (Re)arm for the absolute `deadline`.
    pub fn arm(&mut self, deadline: DateTime<Utc>) {
        self.deadline = Some(deadline);
        self.pending = true;
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
        self.pending = false;
    }

    /// Wall-clock deadline of the current or most recent arming.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Deadline still waiting to expire; `None` once expired or disarmed.
    pub fn pending(&self) -> Option<DateTime<Utc>> {
        self.deadline.filter(|_| self.pending)
    }

    /// Time left until the pending deadline as seen from `now`; zero when
    /// it has already passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.pending()
            .map(|deadline| (deadline - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Record an expiration when the wall clock reads `now` at or past the
    /// deadline.
    pub fn check(&mut self, now: DateTime<Utc>) -> bool {
        match self.pending() {
            Some(deadline) if deadline <= now => {
                self.pending = false;
                self.expirations += 1;
                true
            }
            _ => false,
        }
    }

    /// Take and reset the expiration count.
    pub fn drain(&mut self) -> u64 {
        std::mem::take(&mut self.expirations)
    }
}
