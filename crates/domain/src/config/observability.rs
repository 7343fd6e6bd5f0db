use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line (the daemon default).
    #[default]
    Json,
    /// Human-readable single-line output.
    Compact,
}

/// How the long-running `run` command logs.
///
/// `RUST_LOG` always wins over `default_filter`; one-shot CLI commands
/// ignore this section and log compactly to stderr at `warn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "d_default_filter")]
    pub default_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            default_filter: d_default_filter(),
        }
    }
}

fn d_default_filter() -> String {
    "info,ct_timerd=debug".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_json() {
        let cfg = ObservabilityConfig::default();
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.default_filter, "info,ct_timerd=debug");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn deserialize_compact() {
        let cfg: ObservabilityConfig = toml::from_str(
            r#"
            log_format = "compact"
            default_filter = "debug"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.log_format, LogFormat::Compact);
        assert_eq!(cfg.default_filter, "debug");
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ObservabilityConfig {
            log_format: LogFormat::Compact,
            default_filter: "trace".into(),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ObservabilityConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.log_format, LogFormat::Compact);
        assert_eq!(back.default_filter, "trace");
    }
}
