use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ct_domain::config::{LogFormat, ObservabilityConfig};
use ct_timerd::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { expressions } => {
            let (config, config_path) = ct_timerd::cli::load_config()?;
            init_tracing(&config.observability);
            tracing::info!(config = %config_path, "ctimerd starting");
            ct_timerd::cli::run::run(config, expressions).await
        }
        Command::Parse { expression, json } => {
            init_cli_tracing();
            ct_timerd::cli::parse::run(&expression, json)
        }
        Command::Next {
            expression,
            from,
            count,
        } => {
            init_cli_tracing();
            ct_timerd::cli::next::run(&expression, from.as_deref(), count)
        }
        Command::Config(ConfigCommand::Validate) => {
            init_cli_tracing();
            let (config, config_path) = ct_timerd::cli::load_config()?;
            if !ct_timerd::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            init_cli_tracing();
            let (config, _config_path) = ct_timerd::cli::load_config()?;
            ct_timerd::cli::config::show(&config)
        }
    }
}

/// Structured tracing for the long-running `run` command.
///
/// `RUST_LOG` overrides the configured default filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.default_filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Compact stderr-only tracing for one-shot commands.
///
/// Defaults to `warn` so diagnostics do not mix with stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
