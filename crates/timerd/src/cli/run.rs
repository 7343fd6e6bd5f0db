//! `ctimerd run`: host a timer pool in the foreground.
//!
//! Registers the configured timers plus those given on the command line,
//! starts the dispatcher thread, and prints each fulfilment until Ctrl-C.

use std::sync::Arc;

use ct_domain::config::Config;

use crate::pool::TimerPool;
use crate::sink::{ChannelSink, Fulfilment};

pub async fn run(config: Config, extra: Vec<String>) -> anyhow::Result<()> {
    let (sink, mut rx) = ChannelSink::new();
    let pool = TimerPool::new(Arc::new(sink), config.pool.clone());

    let registered = register(&pool, config.timers.expressions.iter().chain(extra.iter()));
    if registered == 0 {
        anyhow::bail!("no timers to run (add expressions to [timers] or the command line)");
    }

    let dispatcher = pool.spawn()?;
    tracing::info!(timers = registered, "ctimerd running");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(fulfilment) => print_fulfilment(&fulfilment),
                None => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    pool.shutdown()?;
    tokio::task::spawn_blocking(move || dispatcher.join())
        .await?
        .map_err(|_| anyhow::anyhow!("timer dispatcher thread panicked"))?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Add every expression to the pool; returns how many were accepted.
/// Rejected expressions are logged and skipped.
pub(crate) fn register<'a>(pool: &TimerPool, expressions: impl Iterator<Item = &'a String>) -> usize {
    let mut accepted = 0;
    for expr in expressions {
        match pool.add_or_ref(expr) {
            Ok(refs) => {
                tracing::debug!(timer = %expr, refs, "timer registered");
                accepted += 1;
            }
            Err(e) => tracing::error!(timer = %expr, error = %e, "failed to register timer"),
        }
    }
    accepted
}

fn print_fulfilment(f: &Fulfilment) {
    println!("{}  {}:{}", f.at.to_rfc3339(), f.dependency, f.event);
}
