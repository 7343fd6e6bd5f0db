//! The boundary between the timer pool and the task/dependency database.

use crate::error::Result;

/// Dependency name every timer fulfils. The event string is the timer's
/// registration name, so task files depend on `"@timer"` + `<name>`.
pub const TIMER_DEPENDENCY: &str = "@timer";

/// Receives "timer fired" notifications and turns them into dependency
/// fulfilments.
///
/// Called from the dispatcher thread while the pool lock is held: an
/// implementation must not block and must not call back into the pool.
pub trait DependencySink: Send + Sync {
    fn fulfill(&self, dependency: &str, event: &str) -> Result<()>;
}

impl<F> DependencySink for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn fulfill(&self, dependency: &str, event: &str) -> Result<()> {
        self(dependency, event)
    }
}
