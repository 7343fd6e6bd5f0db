use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timer pool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sizing and threading settings for the timer pool.
///
/// The pool grows on demand; `initial_capacity` only pre-allocates slots.
/// `max_timers` is an optional hard ceiling; once reached, new
/// registrations fail instead of growing the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "d_initial_capacity")]
    pub initial_capacity: usize,

    /// Hard limit on live timers. `None` means unlimited.
    #[serde(default)]
    pub max_timers: Option<usize>,

    /// Name given to the dispatcher OS thread.
    #[serde(default = "d_thread_name")]
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: d_initial_capacity(),
            max_timers: None,
            thread_name: d_thread_name(),
        }
    }
}

fn d_initial_capacity() -> usize {
    256
}

fn d_thread_name() -> String {
    "timer-dispatch".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.initial_capacity, 256);
        assert!(cfg.max_timers.is_none());
        assert_eq!(cfg.thread_name, "timer-dispatch");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: PoolConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.initial_capacity, 256);
        assert!(cfg.max_timers.is_none());
    }

    #[test]
    fn deserialize_with_limit() {
        let cfg: PoolConfig = toml::from_str("max_timers = 16\ninitial_capacity = 4").unwrap();
        assert_eq!(cfg.max_timers, Some(16));
        assert_eq!(cfg.initial_capacity, 4);
        assert_eq!(cfg.thread_name, "timer-dispatch");
    }
}
