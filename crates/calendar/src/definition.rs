//! The normalized interval form of a calendar expression, with
//! validation, formatting and instant matching.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use ct_domain::error::{Severity, ValidationError, ValidationIssue};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field domains
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The legal values of one calendar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
}

impl Domain {
    pub const fn admits(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

pub const YEARS: Domain = Domain { name: "year", min: 0, max: 65535 };
pub const MONTHS: Domain = Domain { name: "month", min: 1, max: 12 };
pub const DAYS: Domain = Domain { name: "day", min: 1, max: 31 };
pub const HOURS: Domain = Domain { name: "hour", min: 0, max: 23 };
pub const MINUTES: Domain = Domain { name: "minute", min: 0, max: 59 };
pub const SECONDS: Domain = Domain { name: "second", min: 0, max: 59 };

/// Offsets outside this hour range are accepted but logged as suspicious.
pub const ADVISORY_OFFSET_HOURS: (i8, i8) = (-11, 15);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interval
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A closed interval `[lo, hi]`. When `lo > hi` the interval wraps:
/// it matches values `>= lo` or `<= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub lo: u32,
    pub hi: u32,
}

impl Interval {
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    pub const fn exact(value: u32) -> Self {
        Self { lo: value, hi: value }
    }

    pub const fn full(domain: Domain) -> Self {
        Self {
            lo: domain.min,
            hi: domain.max,
        }
    }

    pub const fn is_exact(&self) -> bool {
        self.lo == self.hi
    }

    pub const fn wraps(&self) -> bool {
        self.lo > self.hi
    }

    pub const fn contains(&self, value: u32) -> bool {
        if self.lo <= self.hi {
            self.lo <= value && value <= self.hi
        } else {
            value >= self.lo || value <= self.hi
        }
    }

    /// Smallest member of the interval that is `>= from` and `<= max`.
    pub fn next_from(&self, from: u32, max: u32) -> Option<u32> {
        if from > max {
            return None;
        }
        if self.contains(from) {
            return Some(from);
        }
        // `from` sits in the gap below `lo`; the next member is `lo` itself.
        (self.lo > from && self.lo <= max).then_some(self.lo)
    }

    /// Smallest member of the interval within `[min, max]`.
    pub fn first(&self, min: u32, max: u32) -> Option<u32> {
        self.next_from(min, max)
    }

    fn write_padded(&self, f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
        if self.is_exact() {
            write!(f, "{:0width$}", self.lo)
        } else {
            write!(f, "{:0width$}..{:0width$}", self.lo, self.hi)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Weekday mask
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Set of allowed weekdays; bit 0 is Monday, bit 6 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    pub const ALL: WeekdayMask = WeekdayMask(0x7f);
    pub const NONE: WeekdayMask = WeekdayMask(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub fn single(day: Weekday) -> Self {
        Self(1 << day.num_days_from_monday())
    }

    /// All days from `start` to `end` inclusive, wrapping past Sunday.
    pub fn from_range(start: Weekday, end: Weekday) -> Self {
        let mut bits = 0u8;
        let mut day = start;
        loop {
            bits |= 1 << day.num_days_from_monday();
            if day == end {
                break;
            }
            day = day.succ();
        }
        Self(bits)
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 & 0x7f == 0
    }

    pub const fn is_all(&self) -> bool {
        self.0 & 0x7f == 0x7f
    }

    /// Days to add to `from` to reach the next allowed weekday (1..=7).
    pub fn days_until_next(&self, from: Weekday) -> Option<u32> {
        let mut day = from;
        for step in 1..=7 {
            day = day.succ();
            if self.contains(day) {
                return Some(step);
            }
        }
        None
    }

    /// The mask as a single `(first, last)` run, wrapping past Sunday.
    /// `None` when the selected days are not contiguous or the mask is empty.
    pub fn as_run(&self) -> Option<(Weekday, Weekday)> {
        if self.is_empty() {
            return None;
        }
        if self.is_all() {
            return Some((Weekday::Mon, Weekday::Sun));
        }
        // The run starts at a selected day whose predecessor is unselected.
        let start = (0..7u8).find(|&i| {
            self.0 & (1u8 << i) != 0 && self.0 & (1u8 << ((i + 6) % 7)) == 0
        })?;
        let mut len = 0u8;
        while len < 7 && self.0 & (1u8 << ((start + len) % 7)) != 0 {
            len += 1;
        }
        if u32::from(len) != (self.0 & 0x7f).count_ones() {
            return None;
        }
        Some((weekday_from_index(start), weekday_from_index((start + len - 1) % 7)))
    }
}

impl Default for WeekdayMask {
    fn default() -> Self {
        Self::ALL
    }
}

fn weekday_from_index(i: u8) -> Weekday {
    match i % 7 {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

pub(crate) fn weekday_abbreviation(day: Weekday) -> &'static str {
    WEEKDAY_ABBREVIATIONS[day.num_days_from_monday() as usize]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UTC offset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fixed timezone offset. The sign lives on `hours`; `minutes` is always
/// a non-negative magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UtcOffset {
    pub hours: i8,
    pub minutes: u8,
}

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset { hours: 0, minutes: 0 };

    pub const fn new(hours: i8, minutes: u8) -> Self {
        Self { hours, minutes }
    }

    /// Signed offset east of UTC in seconds.
    pub fn seconds(&self) -> i32 {
        let magnitude = i32::from(self.hours.unsigned_abs()) * 3600 + i32::from(self.minutes) * 60;
        if self.hours < 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.seconds())
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hours < 0 { '-' } else { '+' };
        write!(f, "{sign}{:02}{:02}", self.hours.unsigned_abs(), self.minutes)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Calendar arithmetic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn is_leap_year(year: u32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CalendarDefinition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parsed calendar expression: one interval per civil-time field, a
/// weekday mask, and a fixed UTC offset.
///
/// `Default` is the parser's starting point: every date field open, time
/// pinned to `00:00:00` UTC. That is exactly what `daily` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarDefinition {
    pub weekdays: WeekdayMask,
    pub years: Interval,
    pub months: Interval,
    pub days: Interval,
    pub hours: Interval,
    pub minutes: Interval,
    pub seconds: Interval,
    pub timezone: UtcOffset,
}

impl Default for CalendarDefinition {
    fn default() -> Self {
        Self {
            weekdays: WeekdayMask::ALL,
            years: Interval::full(YEARS),
            months: Interval::full(MONTHS),
            days: Interval::full(DAYS),
            hours: Interval::exact(0),
            minutes: Interval::exact(0),
            seconds: Interval::exact(0),
            timezone: UtcOffset::UTC,
        }
    }
}

impl CalendarDefinition {
    /// Matches every second of every day.
    pub fn every_second() -> Self {
        Self {
            hours: Interval::full(HOURS),
            minutes: Interval::full(MINUTES),
            seconds: Interval::full(SECONDS),
            ..Self::default()
        }
    }

    pub fn set_default(&mut self) {
        *self = Self::default();
    }

    fn fields(&self) -> [(Domain, Interval); 6] {
        [
            (YEARS, self.years),
            (MONTHS, self.months),
            (DAYS, self.days),
            (HOURS, self.hours),
            (MINUTES, self.minutes),
            (SECONDS, self.seconds),
        ]
    }

    /// Check every field and cross-field rule, collecting all findings.
    ///
    /// Returns the warnings when no error was found. Every finding is also
    /// logged.
    pub fn validate(&self) -> Result<Vec<ValidationIssue>, ValidationError> {
        let mut issues = Vec::new();

        if self.weekdays.is_empty() || self.weekdays.bits() > 0x7f {
            issues.push(ValidationIssue::error(
                "weekday",
                format!("{:#04x} is not a usable weekday mask", self.weekdays.bits()),
            ));
        }

        for (domain, interval) in self.fields() {
            for bound in [interval.lo, interval.hi] {
                if !domain.admits(bound) {
                    issues.push(ValidationIssue::error(
                        domain.name,
                        format!("{bound:02} is not a valid {}", domain.name),
                    ));
                }
            }
        }

        if self.years.wraps() {
            issues.push(ValidationIssue::error(
                "year",
                format!(
                    "{}..{} runs backwards; year ranges cannot wrap",
                    self.years.lo, self.years.hi
                ),
            ));
        }

        let tz = self.timezone;
        if tz.minutes > 59 || !(-23..=23).contains(&tz.hours) {
            issues.push(ValidationIssue::error(
                "timezone",
                format!("{tz} is not a well formatted timezone"),
            ));
        } else if !(ADVISORY_OFFSET_HOURS.0..=ADVISORY_OFFSET_HOURS.1).contains(&tz.hours) {
            issues.push(ValidationIssue::warning(
                "timezone",
                format!("{tz} is probably not a correct timezone"),
            ));
        }

        if self.months.is_exact() && MONTHS.admits(self.months.lo) {
            let month = self.months.lo;
            let longest = if month == 2 {
                if self.admits_leap_year() {
                    29
                } else {
                    28
                }
            } else {
                days_in_month(2000, month)
            };
            // Each bound must itself name a day of the month, whether or
            // not the range wraps.
            let mut bounds = vec![self.days.lo];
            if self.days.hi != self.days.lo {
                bounds.push(self.days.hi);
            }
            for day in bounds {
                if DAYS.admits(day) && day > longest {
                    issues.push(ValidationIssue::error(
                        "day",
                        format!("{day:02} is not a valid day in {}", month_name(month)),
                    ));
                }
            }
        }

        for issue in &issues {
            match issue.severity {
                Severity::Error => tracing::warn!(field = issue.field, "{}", issue.message),
                Severity::Warning => tracing::info!(field = issue.field, "{}", issue.message),
            }
        }

        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ValidationError { issues: errors })
        }
    }

    fn admits_leap_year(&self) -> bool {
        if self.years.wraps() {
            return true;
        }
        // Leap years are never more than eight years apart.
        (self.years.lo..=self.years.hi).take(9).any(is_leap_year)
    }

    /// `instant` expressed in this definition's fixed offset.
    pub fn civil_time(&self, instant: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        Some(instant.with_timezone(&self.timezone.fixed_offset()?))
    }

    /// Whether the civil time of `instant` satisfies every field.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let Some(civil) = self.civil_time(instant) else {
            return false;
        };
        let Ok(year) = u32::try_from(civil.year()) else {
            return false;
        };
        self.years.contains(year)
            && self.months.contains(civil.month())
            && self.days.contains(civil.day())
            && self.hours.contains(civil.hour())
            && self.minutes.contains(civil.minute())
            && self.seconds.contains(civil.second())
            && self.weekdays.contains(civil.weekday())
    }

    /// A calendar expression that parses back to this definition, or `None`
    /// when the weekday mask has gaps the grammar cannot express.
    pub fn to_expression(&self) -> Option<String> {
        let weekdays = if self.weekdays.is_all() {
            "*".to_string()
        } else {
            match self.weekdays.as_run()? {
                (a, b) if a == b => weekday_abbreviation(a).to_string(),
                (a, b) => format!("{}..{}", weekday_abbreviation(a), weekday_abbreviation(b)),
            }
        };
        Some(format!(
            "{weekdays}-{}-{}-{}-{}:{}:{}{}",
            DisplayInterval(self.years, 4),
            DisplayInterval(self.months, 2),
            DisplayInterval(self.days, 2),
            DisplayInterval(self.hours, 2),
            DisplayInterval(self.minutes, 2),
            DisplayInterval(self.seconds, 2),
            self.timezone,
        ))
    }
}

struct DisplayInterval(Interval, usize);

impl fmt::Display for DisplayInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_padded(f, self.1)
    }
}

/// Canonical log form, e.g.
/// `0000..65535-01..12-01..31 09:00:00 +0100 |Mon Tue Wed Thu Fri _   _  |`.
impl fmt::Display for CalendarDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{} {}:{}:{} {} |",
            DisplayInterval(self.years, 4),
            DisplayInterval(self.months, 2),
            DisplayInterval(self.days, 2),
            DisplayInterval(self.hours, 2),
            DisplayInterval(self.minutes, 2),
            DisplayInterval(self.seconds, 2),
            self.timezone,
        )?;
        for (i, name) in WEEKDAY_ABBREVIATIONS.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if self.weekdays.bits() & (1 << i) != 0 {
                f.write_str(name)?;
            } else {
                f.write_str("_  ")?;
            }
        }
        f.write_str("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wrapping_hours_match_only_the_wrapped_values() {
        let hours = Interval::new(23, 1);
        let matched: Vec<u32> = (0..=23).filter(|h| hours.contains(*h)).collect();
        assert_eq!(matched, vec![0, 1, 23]);
    }

    #[test]
    fn next_from_handles_gaps_and_wraps() {
        let plain = Interval::new(10, 20);
        assert_eq!(plain.next_from(3, 59), Some(10));
        assert_eq!(plain.next_from(15, 59), Some(15));
        assert_eq!(plain.next_from(21, 59), None);

        let wrapped = Interval::new(23, 1);
        assert_eq!(wrapped.next_from(0, 23), Some(0));
        assert_eq!(wrapped.next_from(2, 23), Some(23));
        assert_eq!(wrapped.next_from(24, 23), None);

        // Lower bound beyond the month's last day.
        assert_eq!(Interval::new(30, 2).next_from(5, 28), None);
    }

    #[test]
    fn weekday_range_wraps_past_sunday() {
        let mask = WeekdayMask::from_range(Weekday::Sat, Weekday::Tue);
        assert_eq!(mask.bits(), 0x63);
        assert_eq!(mask.as_run(), Some((Weekday::Sat, Weekday::Tue)));
    }

    #[test]
    fn weekday_mask_with_gaps_has_no_run() {
        let mask = WeekdayMask::from_bits(0b101);
        assert_eq!(mask.as_run(), None);
    }

    #[test]
    fn days_until_next_weekday() {
        let mask = WeekdayMask::single(Weekday::Mon);
        assert_eq!(mask.days_until_next(Weekday::Thu), Some(4));
        assert_eq!(mask.days_until_next(Weekday::Mon), Some(7));
        assert_eq!(WeekdayMask::NONE.days_until_next(Weekday::Mon), None);
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2100, 2), 28);
        assert_eq!(days_in_month(2023, 4), 30);
    }

    #[test]
    fn default_is_midnight_every_day() {
        let def = CalendarDefinition::default();
        assert_eq!(def.hours, Interval::exact(0));
        assert_eq!(def.years, Interval::new(0, 65535));
        assert!(def.weekdays.is_all());
        assert!(def.validate().unwrap().is_empty());
    }

    #[test]
    fn validate_reports_every_violation() {
        let def = CalendarDefinition {
            months: Interval::new(0, 13),
            hours: Interval::exact(24),
            ..CalendarDefinition::default()
        };
        let err = def.validate().unwrap_err();
        let fields: Vec<&str> = err.issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["month", "month", "hour", "hour"]);
    }

    #[test]
    fn day_31_rejected_for_thirty_day_month() {
        let def = CalendarDefinition {
            months: Interval::exact(4),
            days: Interval::exact(31),
            ..CalendarDefinition::default()
        };
        assert!(def.validate().is_err());

        let ok = CalendarDefinition {
            months: Interval::exact(4),
            days: Interval::new(1, 30),
            ..CalendarDefinition::default()
        };
        assert!(ok.validate().is_ok());

        for days in [Interval::new(1, 31), Interval::new(30, 31), Interval::new(31, 5)] {
            let def = CalendarDefinition {
                months: Interval::exact(4),
                days,
                ..CalendarDefinition::default()
            };
            let err = def.validate().unwrap_err();
            assert_eq!(err.issues.len(), 1, "{days:?}");
            assert_eq!(err.issues[0].field, "day");
        }
    }

    #[test]
    fn february_29_needs_a_leap_year() {
        let feb29 = CalendarDefinition {
            months: Interval::exact(2),
            days: Interval::exact(29),
            ..CalendarDefinition::default()
        };
        assert!(feb29.validate().is_ok());

        let no_leap = CalendarDefinition {
            years: Interval::new(2021, 2023),
            ..feb29
        };
        assert!(no_leap.validate().is_err());

        let feb30 = CalendarDefinition {
            days: Interval::exact(30),
            ..feb29
        };
        assert!(feb30.validate().is_err());
    }

    #[test]
    fn unusual_timezone_is_only_a_warning() {
        let def = CalendarDefinition {
            timezone: UtcOffset::new(-12, 0),
            ..CalendarDefinition::default()
        };
        let warnings = def.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "timezone");

        let broken = CalendarDefinition {
            timezone: UtcOffset::new(1, 60),
            ..CalendarDefinition::default()
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn display_matches_canonical_form() {
        let def = CalendarDefinition {
            weekdays: WeekdayMask::from_range(Weekday::Mon, Weekday::Fri),
            hours: Interval::exact(9),
            timezone: UtcOffset::new(1, 0),
            ..CalendarDefinition::default()
        };
        assert_eq!(
            def.to_string(),
            "0000..65535-01..12-01..31 09:00:00 +0100 |Mon Tue Wed Thu Fri _   _  |"
        );
    }

    #[test]
    fn negative_offset_formats_with_sign_on_hours() {
        assert_eq!(UtcOffset::new(-5, 30).to_string(), "-0530");
        assert_eq!(UtcOffset::new(-5, 30).seconds(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn matches_uses_the_definition_offset() {
        let def = CalendarDefinition {
            hours: Interval::exact(9),
            timezone: UtcOffset::new(1, 0),
            ..CalendarDefinition::default()
        };
        // 08:00 UTC is 09:00 at +0100.
        assert!(def.matches(Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()));
        assert!(!def.matches(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()));
    }

    #[test]
    fn expression_for_gapped_mask_is_none() {
        let def = CalendarDefinition {
            weekdays: WeekdayMask::from_bits(0b0000101),
            ..CalendarDefinition::default()
        };
        assert!(def.to_expression().is_none());
    }
}
