//! `ctimerd next`: preview upcoming occurrences.

use std::io::Write;

use anyhow::Context;
use chrono::{DateTime, Utc};

use ct_calendar::{next_occurrences, CalendarDefinition};

pub fn run(expression: &str, from: Option<&str>, count: usize) -> anyhow::Result<()> {
    let from = match from {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("--from '{text}' is not an RFC 3339 timestamp"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let stdout = std::io::stdout();
    render(expression, from, count, &mut stdout.lock())
}

pub(crate) fn render(
    expression: &str,
    from: DateTime<Utc>,
    count: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let def: CalendarDefinition = expression
        .parse()
        .map_err(|e| anyhow::anyhow!("'{expression}': {e}"))?;

    let hits = next_occurrences(&def, from, count);
    for hit in &hits {
        match def.civil_time(*hit) {
            Some(civil) => writeln!(out, "{}", civil.format("%F %H:%M:%S %z  %a"))?,
            None => writeln!(out, "{}", hit.to_rfc3339())?,
        }
    }
    if hits.len() < count {
        tracing::warn!(
            expression,
            found = hits.len(),
            requested = count,
            "definition has no further occurrences"
        );
        writeln!(out, "(no further occurrences)")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prints_civil_times_in_definition_offset() {
        let from = Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap();
        let mut out = Vec::new();
        render("Mon..Fri-*-*-*-09:00:00+0100", from, 2, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "2025-03-10 09:00:00 +0100  Mon",
                "2025-03-11 09:00:00 +0100  Tue"
            ]
        );
    }

    #[test]
    fn reports_exhausted_definitions() {
        let from = Utc.with_ymd_and_hms(2025, 12, 30, 12, 0, 0).unwrap();
        let mut out = Vec::new();
        render("2025-12-31", from, 3, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["2025-12-31 00:00:00 +0000  Wed", "(no further occurrences)"]
        );
    }
}
