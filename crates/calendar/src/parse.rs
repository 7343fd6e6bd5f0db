//! Calendar expression parser.
//!
//! ```text
//! [weekday-][year[-month-day]-][HH:MM[:SS]][±ZZ[:]zz]
//! ```
//!
//! Every numeric field accepts a single value, a `lo..hi` range (either
//! bound may be omitted), or `*`. Fields that are not mentioned keep the
//! values of [`CalendarDefinition::default`], i.e. midnight every day.

use std::str::FromStr;

use chrono::Weekday;

use ct_domain::error::ParseError;

use crate::definition::{
    CalendarDefinition, Domain, Interval, UtcOffset, WeekdayMask, DAYS, HOURS, MINUTES,
    MONTHS, SECONDS, YEARS,
};

const YEAR_DIGITS: usize = 5;
const FIELD_DIGITS: usize = 2;

/// Parse a calendar expression into a validated definition.
pub fn parse(text: &str) -> Result<CalendarDefinition, ParseError> {
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    if let Some((offset, ch)) = text.char_indices().find(|(_, c)| !is_grammar_char(*c)) {
        return Err(ParseError::InvalidCharacter { ch, offset });
    }

    let def = match shortcut(text) {
        Some(def) => def,
        None => parse_expression(text)?,
    };
    def.validate()?;
    Ok(def)
}

impl FromStr for CalendarDefinition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

fn is_grammar_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | ':' | '.' | '*')
}

fn shortcut(text: &str) -> Option<CalendarDefinition> {
    let daily = CalendarDefinition::default();
    let def = match text.to_ascii_lowercase().as_str() {
        "minutely" => CalendarDefinition {
            hours: Interval::full(HOURS),
            minutes: Interval::full(MINUTES),
            ..daily
        },
        "hourly" => CalendarDefinition {
            hours: Interval::full(HOURS),
            ..daily
        },
        "daily" => daily,
        "weekly" => CalendarDefinition {
            weekdays: WeekdayMask::single(Weekday::Mon),
            ..daily
        },
        "monthly" => CalendarDefinition {
            days: Interval::exact(1),
            ..daily
        },
        "yearly" | "annually" => CalendarDefinition {
            months: Interval::exact(1),
            days: Interval::exact(1),
            ..daily
        },
        _ => return None,
    };
    Some(def)
}

fn parse_expression(text: &str) -> Result<CalendarDefinition, ParseError> {
    let mut def = CalendarDefinition::default();

    // The clock part starts after the last '-' preceding the first ':'.
    let (prefix, clock) = match text.find(':') {
        Some(colon) => match text[..colon].rfind('-') {
            Some(dash) => (Some(&text[..dash]), Some(&text[dash + 1..])),
            None => (None, Some(text)),
        },
        None => (Some(text), None),
    };

    if let Some(prefix) = prefix {
        parse_date_prefix(prefix, &mut def)?;
    }
    if let Some(clock) = clock {
        parse_clock(clock, &mut def)?;
    }
    Ok(def)
}

fn parse_date_prefix(prefix: &str, def: &mut CalendarDefinition) -> Result<(), ParseError> {
    let tokens: Vec<&str> = prefix.split('-').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(ParseError::EmptyField { field: "date" });
    }

    let (weekday, date) = match tokens.as_slice() {
        [first, rest @ ..] if first.starts_with(|c: char| c.is_ascii_alphabetic()) => {
            (Some(*first), rest)
        }
        // A leading `*` is a weekday only when a full or year-only date follows.
        [first, rest @ ..] if *first == "*" && matches!(rest.len(), 1 | 3) => (Some(*first), rest),
        all => (None, all),
    };

    if let Some(token) = weekday {
        def.weekdays = parse_weekdays(token)?;
    }

    match date {
        [] => {}
        [year] => def.years = parse_field(year, YEARS, YEAR_DIGITS)?,
        [year, month, day] => {
            def.years = parse_field(year, YEARS, YEAR_DIGITS)?;
            def.months = parse_field(month, MONTHS, FIELD_DIGITS)?;
            def.days = parse_field(day, DAYS, FIELD_DIGITS)?;
        }
        other => {
            return Err(ParseError::Malformed(format!(
                "expected year or year-month-day, got {} date fields",
                other.len()
            )))
        }
    }
    Ok(())
}

fn parse_weekdays(token: &str) -> Result<WeekdayMask, ParseError> {
    if token == "*" {
        return Ok(WeekdayMask::ALL);
    }
    match token.split_once("..") {
        Some((start, end)) => Ok(WeekdayMask::from_range(
            parse_weekday(start)?,
            parse_weekday(end)?,
        )),
        None => Ok(WeekdayMask::single(parse_weekday(token)?)),
    }
}

fn parse_weekday(token: &str) -> Result<Weekday, ParseError> {
    let day = match token.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return Err(ParseError::UnknownWeekday(token.to_string())),
    };
    Ok(day)
}

fn parse_clock(segment: &str, def: &mut CalendarDefinition) -> Result<(), ParseError> {
    let (clock, zone) = match segment.find(['+', '-']) {
        Some(i) => (&segment[..i], Some(&segment[i..])),
        None => (segment, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if !matches!(parts.len(), 2 | 3) {
        return Err(ParseError::Malformed(format!(
            "'{clock}' is not HH:MM or HH:MM:SS"
        )));
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ParseError::EmptyField { field: "time" });
    }

    def.hours = parse_field(parts[0], HOURS, FIELD_DIGITS)?;
    def.minutes = parse_field(parts[1], MINUTES, FIELD_DIGITS)?;
    if let Some(seconds) = parts.get(2) {
        def.seconds = parse_field(seconds, SECONDS, FIELD_DIGITS)?;
    }
    if let Some(zone) = zone {
        def.timezone = parse_timezone(zone)?;
    }
    Ok(())
}

fn parse_field(token: &str, domain: Domain, max_digits: usize) -> Result<Interval, ParseError> {
    if token == "*" {
        return Ok(Interval::full(domain));
    }
    match token.split_once("..") {
        Some((lo, hi)) => {
            let lo = if lo.is_empty() {
                domain.min
            } else {
                parse_number(lo, domain, max_digits)?
            };
            let hi = if hi.is_empty() {
                domain.max
            } else {
                parse_number(hi, domain, max_digits)?
            };
            Ok(Interval::new(lo, hi))
        }
        None => Ok(Interval::exact(parse_number(token, domain, max_digits)?)),
    }
}

fn parse_number(token: &str, domain: Domain, max_digits: usize) -> Result<u32, ParseError> {
    if token.is_empty() || token.len() > max_digits || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber {
            field: domain.name,
            token: token.to_string(),
        });
    }
    let value: u32 = token.parse().map_err(|_| ParseError::InvalidNumber {
        field: domain.name,
        token: token.to_string(),
    })?;
    if !domain.admits(value) {
        return Err(ParseError::OutOfRange {
            field: domain.name,
            value,
            min: domain.min,
            max: domain.max,
        });
    }
    Ok(value)
}

/// `+H`, `+HH`, `+HMM`, `+HHMM`, `+H:MM`, `+HH:MM` (and `-` variants).
fn parse_timezone(zone: &str) -> Result<UtcOffset, ParseError> {
    let invalid = || ParseError::InvalidTimezone(zone.to_string());
    let negative = zone.starts_with('-');
    let body = &zone[1..];

    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => match body.len() {
            1 | 2 => (body, ""),
            3 => body.split_at(1),
            4 => body.split_at(2),
            _ => return Err(invalid()),
        },
    };

    let digits = |s: &str| s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit());
    if hours.is_empty() || !digits(hours) || !digits(minutes) {
        return Err(invalid());
    }
    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = if minutes.is_empty() {
        0
    } else {
        minutes.parse().map_err(|_| invalid())?
    };
    if hours > 23 {
        return Err(ParseError::OutOfRange {
            field: "timezone hour",
            value: hours.into(),
            min: 0,
            max: 23,
        });
    }
    if minutes > 59 {
        return Err(ParseError::OutOfRange {
            field: "timezone minute",
            value: minutes.into(),
            min: 0,
            max: 59,
        });
    }

    let hours = hours as i8;
    Ok(UtcOffset::new(if negative { -hours } else { hours }, minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_equals_explicit_midnight() {
        assert_eq!(parse("daily").unwrap(), parse("*-*-*-00:00:00+0000").unwrap());
    }

    #[test]
    fn shortcuts_are_case_insensitive() {
        assert_eq!(parse("HoUrLy").unwrap(), parse("hourly").unwrap());
        assert_eq!(parse("ANNUALLY").unwrap(), parse("yearly").unwrap());
    }

    #[test]
    fn weekday_range_wraps() {
        let def = parse("Sat..Tue-23..1:00").unwrap();
        assert_eq!(def.weekdays.bits(), 0x63);
        assert_eq!(def.hours, Interval::new(23, 1));
        assert_eq!(def.minutes, Interval::exact(0));
        assert_eq!(def.seconds, Interval::exact(0));
    }

    #[test]
    fn omitted_range_bounds_take_domain_bounds() {
        let def = parse("mon-..-01..12-01..31-04..13:02..30:1..55").unwrap();
        assert_eq!(def.years, Interval::new(0, 65535));
        let def = parse("mon-0..-01..12-01..31-04..13:02..30:1..55").unwrap();
        assert_eq!(def.years, Interval::new(0, 65535));
    }

    #[test]
    fn timezone_spellings() {
        for zone in ["+1", "+01", "+100", "+0100", "+01:00", "+1:00"] {
            let def = parse(&format!("12:00{zone}")).unwrap();
            assert_eq!(def.timezone, UtcOffset::new(1, 0), "{zone}");
        }
        let def = parse("09:30-05:30").unwrap();
        assert_eq!(def.timezone, UtcOffset::new(-5, 30));
    }

    #[test]
    fn time_without_timezone_is_utc() {
        let def = parse("Mon..Fri-*-*-*-09:00:00").unwrap();
        assert_eq!(def.timezone, UtcOffset::UTC);
        assert_eq!(def.weekdays.bits(), 0x1f);
    }

    #[test]
    fn rejects_overlong_numbers() {
        assert!(matches!(
            parse("*-*-015"),
            Err(ParseError::InvalidNumber { field: "day", .. })
        ));
        assert!(parse("00:000:00").is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            parse("*-*-32").unwrap_err(),
            ParseError::OutOfRange {
                field: "day",
                value: 32,
                min: 1,
                max: 31
            }
        );
    }

    #[test]
    fn rejects_invalid_characters() {
        assert_eq!(
            parse("Mon 12:00").unwrap_err(),
            ParseError::InvalidCharacter { ch: ' ', offset: 3 }
        );
    }

    #[test]
    fn rejects_unknown_weekday() {
        assert_eq!(
            parse("yesterday").unwrap_err(),
            ParseError::UnknownWeekday("yesterday".into())
        );
    }

    #[test]
    fn rejects_semantically_invalid_dates() {
        assert!(matches!(parse("*-04-31"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse("*-02-30"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse("2023-02-29"), Err(ParseError::Invalid(_))));
        assert!(parse("2024-02-29").is_ok());
    }

    #[test]
    fn rejects_bad_timezones() {
        assert!(parse("12:00+").is_err());
        assert!(parse("12:00+01000").is_err());
        assert!(parse("12:00+24").is_err());
        assert!(parse("12:00+01:60").is_err());
    }

    #[test]
    fn from_str_delegates_to_parse() {
        let def: CalendarDefinition = "weekly".parse().unwrap();
        assert_eq!(def.weekdays, WeekdayMask::single(Weekday::Mon));
    }
}
