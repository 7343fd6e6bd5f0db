use std::fmt;

/// Shared error type used across all calendar-timer crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("timer {name}: no future instant satisfies the definition")]
    Unsatisfiable { name: String },

    #[error("timer pool is full ({capacity} timers)")]
    PoolFull { capacity: usize },

    #[error("resource: {0}")]
    Resource(String),

    #[error("timer pool lock is poisoned: {0}")]
    PoolCorruption(String),

    #[error("dependency sink: {0}")]
    Sink(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Calendar expression parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why a calendar expression was rejected by the parser.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty calendar expression")]
    Empty,

    #[error("unexpected character {ch:?} at offset {offset}")]
    InvalidCharacter { ch: char, offset: usize },

    #[error("empty {field} field")]
    EmptyField { field: &'static str },

    #[error("{field}: '{token}' is not a number")]
    InvalidNumber { field: &'static str, token: String },

    #[error("{field}: {value} is outside {min}..{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("unknown weekday '{0}'")]
    UnknownWeekday(String),

    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),

    #[error("malformed expression: {0}")]
    Malformed(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Calendar definition validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single finding produced while validating a calendar definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field,
            message: message.into(),
        }
    }

    pub fn warning(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// Every error-severity issue found in a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
