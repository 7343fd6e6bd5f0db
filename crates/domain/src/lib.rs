//! Shared vocabulary for the calendar-timer workspace: errors,
//! configuration, structured trace events, and the dependency-sink
//! boundary.

pub mod config;
pub mod error;
pub mod sink;
pub mod trace;

pub use error::{Error, Result};
