use ct_domain::config::{Config, ConfigError, ConfigSeverity};

/// Structural checks plus a parse of every configured timer expression.
pub fn issues(config: &Config) -> Vec<ConfigError> {
    let mut issues = config.validate();

    for (i, expr) in config.timers.expressions.iter().enumerate() {
        if expr.trim().is_empty() {
            continue;
        }
        match ct_calendar::parse(expr) {
            Ok(def) => {
                if let Ok(warnings) = def.validate() {
                    issues.extend(warnings.into_iter().map(|w| ConfigError {
                        severity: ConfigSeverity::Warning,
                        field: format!("timers.expressions[{i}]"),
                        message: format!("{}: {}", w.field, w.message),
                    }));
                }
            }
            Err(e) => issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: format!("timers.expressions[{i}]"),
                message: format!("'{expr}': {e}"),
            }),
        }
    }

    issues
}

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = issues(config);

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count, warning_count,
    );

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
