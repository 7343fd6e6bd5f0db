//! Calendar-timer daemon: the reference-counted timer pool, its
//! dispatcher thread, the bundled dependency sinks, and the `ctimerd`
//! command line.

pub mod cli;
pub mod pool;
pub mod sink;

pub use pool::{TimerPool, TimerState, TimerView};
