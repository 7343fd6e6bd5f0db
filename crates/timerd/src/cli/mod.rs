pub mod config;
pub mod next;
pub mod parse;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ct_domain::config::Config;

/// ctimerd: calendar timers that fulfil `@timer` dependencies.
#[derive(Debug, Parser)]
#[command(name = "ctimerd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a calendar expression and print its canonical form.
    Parse {
        /// The calendar expression, e.g. "Mon..Fri-*-*-*-09:00:00+0100".
        expression: String,
        /// Print the parsed definition as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Preview the next occurrences of a calendar expression.
    Next {
        /// The calendar expression.
        expression: String,
        /// Reference instant (RFC 3339); defaults to now.
        #[arg(long)]
        from: Option<String>,
        /// How many occurrences to print.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Run a timer pool with the configured timers plus any given here,
    /// printing each fire until Ctrl-C.
    Run {
        /// Extra calendar expressions to register.
        expressions: Vec<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `CT_CONFIG` (or
/// `ctimerd.toml`). Returns the parsed [`Config`] and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CT_CONFIG").unwrap_or_else(|_| "ctimerd.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

/// Read `path` as TOML; a missing file yields the defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
