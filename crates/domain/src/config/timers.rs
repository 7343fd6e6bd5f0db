use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Startup timers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Calendar expressions registered when the daemon starts.
///
/// Each entry is added to the pool exactly like a task dependency would
/// add it, so repeated entries share one timer with a higher refcount.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimersConfig {
    #[serde(default)]
    pub expressions: Vec<String>,
}
