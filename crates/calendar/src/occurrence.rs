//! Next-occurrence search.
//!
//! Works on civil time in the definition's fixed offset: the time of day
//! is resolved first, then the date is refined field by field until year,
//! month, day and weekday agree.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use ct_domain::error::{Error, Result};

use crate::definition::{days_in_month, is_leap_year, CalendarDefinition, YEARS};

/// Upper bound on date refinement passes before a definition is treated
/// as unsatisfiable.
pub const MAX_REFINEMENTS: usize = 40;

const LAST_NANOSECOND: u32 = 999_999_999;

/// The earliest instant strictly after `last` that satisfies `def`.
///
/// The sub-second part of `last` is carried over to the result. `None`
/// means no such instant exists (the year range is exhausted or the
/// definition cannot be met within [`MAX_REFINEMENTS`] passes).
pub fn next_occurrence(last: DateTime<Utc>, def: &CalendarDefinition) -> Option<DateTime<Utc>> {
    let offset = def.timezone.fixed_offset()?;
    let nanos = last.nanosecond().min(LAST_NANOSECOND);
    let start = last
        .with_nanosecond(0)?
        .with_timezone(&offset)
        .naive_local()
        .checked_add_signed(Duration::seconds(1))?;

    let mut date = start.date();
    let mut from_time = Some((start.hour(), start.minute(), start.second()));

    for _ in 0..MAX_REFINEMENTS {
        let resolved = match refine_date(def, date) {
            Refined::Settled(d) => d,
            Refined::Moved(d) => {
                date = d;
                from_time = None;
                continue;
            }
            Refined::Unsatisfiable => return None,
        };
        if resolved != date {
            from_time = None;
        }
        date = resolved;

        let time = match from_time {
            Some(hms) => next_time_of_day(def, hms),
            None => next_time_of_day(def, (0, 0, 0)),
        };
        let Some((h, m, s)) = time else {
            // Nothing left today.
            date = date.succ_opt()?;
            from_time = None;
            continue;
        };

        let local = date.and_hms_opt(h, m, s)?;
        let instant = offset
            .from_local_datetime(&local)
            .single()?
            .with_timezone(&Utc)
            .with_nanosecond(nanos)?;
        return def.matches(instant).then_some(instant);
    }

    tracing::debug!(definition = %def, "no occurrence within refinement bound");
    None
}

/// Like [`next_occurrence`] but reports an unsatisfiable definition as an
/// error naming the timer.
pub fn try_next_occurrence(
    name: &str,
    last: DateTime<Utc>,
    def: &CalendarDefinition,
) -> Result<DateTime<Utc>> {
    next_occurrence(last, def).ok_or_else(|| Error::Unsatisfiable {
        name: name.to_string(),
    })
}

/// Successive occurrences strictly after a starting instant.
#[derive(Debug, Clone)]
pub struct Occurrences {
    def: CalendarDefinition,
    cursor: Option<DateTime<Utc>>,
}

impl Iterator for Occurrences {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = next_occurrence(self.cursor?, &self.def);
        self.cursor = next;
        next
    }
}

pub fn occurrences_after(def: &CalendarDefinition, after: DateTime<Utc>) -> Occurrences {
    Occurrences {
        def: *def,
        cursor: Some(after),
    }
}

/// Up to `count` occurrences after `after`; fewer when the definition runs out.
pub fn next_occurrences(
    def: &CalendarDefinition,
    after: DateTime<Utc>,
    count: usize,
) -> Vec<DateTime<Utc>> {
    occurrences_after(def, after).take(count).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Time of day
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Smallest allowed `(hour, minute, second)` at or after `from` on the
/// same day.
fn next_time_of_day(def: &CalendarDefinition, from: (u32, u32, u32)) -> Option<(u32, u32, u32)> {
    let (h0, m0, s0) = from;
    let mut hour = def.hours.next_from(h0, 23)?;
    loop {
        let minute_from = if hour == h0 { m0 } else { 0 };
        let mut minute = def.minutes.next_from(minute_from, 59);
        while let Some(m) = minute {
            let second_from = if hour == h0 && m == m0 { s0 } else { 0 };
            if let Some(s) = def.seconds.next_from(second_from, 59) {
                return Some((hour, m, s));
            }
            minute = def.minutes.next_from(m + 1, 59);
        }
        hour = def.hours.next_from(hour + 1, 23)?;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Date refinement
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Refined {
    /// Every date field agrees.
    Settled(NaiveDate),
    /// A field was bumped; the new date needs another pass.
    Moved(NaiveDate),
    Unsatisfiable,
}

/// One refinement pass over year, month, day and weekday.
fn refine_date(def: &CalendarDefinition, date: NaiveDate) -> Refined {
    let Ok(mut year) = u32::try_from(date.year()) else {
        return Refined::Unsatisfiable;
    };
    let mut month = date.month();
    let mut day = date.day();

    if year < def.years.lo {
        return moved(def.years.lo, 1, 1);
    }
    if year > def.years.hi || year > YEARS.max {
        return Refined::Unsatisfiable;
    }

    match def.months.next_from(month, 12) {
        Some(m) if m == month => {}
        Some(m) => {
            month = m;
            day = 1;
        }
        None => return moved(year + 1, 1, 1),
    }

    if month == 2 && def.months.is_exact() && !is_leap_year(year) && feb_29_only(def, day) {
        match (year + 1..=year + 8).find(|y| is_leap_year(*y)) {
            Some(leap) => return moved(leap, 2, 1),
            None => return Refined::Unsatisfiable,
        }
    }

    match def.days.next_from(day, days_in_month(year, month)) {
        Some(d) => day = d,
        None => {
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
            return moved(year, month, 1);
        }
    }

    let Some(candidate) = NaiveDate::from_ymd_opt(year as i32, month, day) else {
        return Refined::Unsatisfiable;
    };
    if def.weekdays.contains(candidate.weekday()) {
        return Refined::Settled(candidate);
    }
    match def.weekdays.days_until_next(candidate.weekday()) {
        Some(step) => candidate
            .checked_add_signed(Duration::days(i64::from(step)))
            .map_or(Refined::Unsatisfiable, Refined::Moved),
        None => Refined::Unsatisfiable,
    }
}

/// The day interval admits nothing in February but the 29th.
fn feb_29_only(def: &CalendarDefinition, from_day: u32) -> bool {
    def.days.next_from(from_day, 28).is_none() && def.days.next_from(from_day, 29) == Some(29)
}

fn moved(year: u32, month: u32, day: u32) -> Refined {
    i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, day))
        .map_or(Refined::Unsatisfiable, Refined::Moved)
}
