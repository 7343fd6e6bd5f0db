//! Calendar expressions: parsing, validation, formatting, and the
//! next-occurrence search used by the timer pool.
//!
//! ```text
//! Mon..Fri-*-*-*-09:00:00+0100   weekdays at nine, one hour east of UTC
//! Sat..Tue-23..1:00              wrapping weekday and hour ranges
//! daily                          midnight every day, UTC
//! ```

pub mod definition;
pub mod occurrence;
pub mod parse;

pub use definition::{CalendarDefinition, Interval, UtcOffset, WeekdayMask};
pub use occurrence::{
    next_occurrence, next_occurrences, occurrences_after, try_next_occurrence, Occurrences,
    MAX_REFINEMENTS,
};
pub use parse::parse;
