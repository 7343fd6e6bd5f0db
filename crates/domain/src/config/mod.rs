mod observability;
mod pool;
mod timers;

pub use observability::*;
pub use pool::*;
pub use timers::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the structural parts of the configuration.
    ///
    /// Timer expressions are only checked for emptiness and duplicates
    /// here; the CLI additionally runs each one through the calendar
    /// parser.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.pool.thread_name.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pool.thread_name".into(),
                message: "dispatcher thread name must not be empty".into(),
            });
        }

        if self.pool.max_timers == Some(0) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pool.max_timers".into(),
                message: "max_timers must be greater than 0 (omit it for no limit)".into(),
            });
        }

        if let Some(max) = self.pool.max_timers {
            if self.timers.expressions.len() > max {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "timers.expressions".into(),
                    message: format!(
                        "{} timers configured but pool.max_timers is {max}",
                        self.timers.expressions.len()
                    ),
                });
            }
        }

        for (i, expr) in self.timers.expressions.iter().enumerate() {
            if expr.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("timers.expressions[{i}]"),
                    message: "timer expression must not be empty".into(),
                });
            } else if self.timers.expressions[..i].contains(expr) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("timers.expressions[{i}]"),
                    message: format!("'{expr}' is listed twice and will be reference-counted"),
                });
            }
        }

        if self.timers.expressions.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "timers.expressions".into(),
                message: "no timers configured".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_only_warns_about_missing_timers() {
        let issues = Config::default().validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
        assert_eq!(issues[0].field, "timers.expressions");
    }

    #[test]
    fn zero_max_timers_is_an_error() {
        let mut config = Config::default();
        config.pool.max_timers = Some(0);
        config.timers.expressions = vec!["daily".into()];
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "pool.max_timers" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn more_timers_than_capacity_is_an_error() {
        let mut config = Config::default();
        config.pool.max_timers = Some(1);
        config.timers.expressions = vec!["daily".into(), "hourly".into()];
        let issues = config.validate();
        assert!(issues.iter().any(|e| e.field == "timers.expressions"));
    }

    #[test]
    fn duplicate_expression_warns() {
        let mut config = Config::default();
        config.timers.expressions = vec!["daily".into(), "daily".into()];
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
        assert_eq!(issues[0].field, "timers.expressions[1]");
    }

    #[test]
    fn display_includes_tag_and_field() {
        let e = ConfigError {
            severity: ConfigSeverity::Error,
            field: "pool.thread_name".into(),
            message: "empty".into(),
        };
        assert_eq!(e.to_string(), "[ERROR] pool.thread_name: empty");
    }
}
