//! `ctimerd parse`: show how an expression is understood.

use std::io::Write;

use ct_calendar::CalendarDefinition;

pub fn run(expression: &str, json: bool) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    render(expression, json, &mut stdout.lock())
}

pub(crate) fn render(expression: &str, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let def: CalendarDefinition = expression
        .parse()
        .map_err(|e| anyhow::anyhow!("'{expression}': {e}"))?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&def)?)?;
        return Ok(());
    }

    writeln!(out, "{def}")?;
    match def.to_expression() {
        Some(canonical) => writeln!(out, "{canonical}")?,
        None => writeln!(out, "(weekday set has no single-range spelling)")?,
    }
    for warning in def.validate().unwrap_or_default() {
        writeln!(out, "{warning}")?;
    }
    Ok(())
}
