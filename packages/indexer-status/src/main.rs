use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod models;
mod monitor;
mod presentation;
mod registry;
mod utils;

#[cfg(test)]
mod test_support;

use config::{Config, OutputFormat};
use monitor::{Aggregator, GraphQlIndexerClient, RpcBlockFetcher, Scheduler, Snapshot};
use presentation::{console, render};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    utils::logger::init_logger();
    info!("Starting indexer status monitor");

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    utils::config_logger::log_config(&config);

    let directory = registry::load_directory(&config.chains_file)?;
    let chains = registry::chains_from_directory(&directory, &config.excluded_chain_ids);
    if chains.is_empty() {
        warn!("Chain directory {} has no chains to monitor", config.chains_file.display());
    }
    info!("Monitoring {} chains", chains.len());

    // One client for every request, bounded by the configured timeout
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .build()
        .context("Failed to build HTTP client")?;
    let aggregator = Aggregator::new(
        Arc::new(RpcBlockFetcher::new(client.clone())),
        Arc::new(GraphQlIndexerClient::new(client)),
    );

    let scheduler = Scheduler::spawn(aggregator, chains, config.polling());
    let mut snapshots = scheduler.subscribe();

    let quit = CancellationToken::new();
    tokio::spawn(console::run_console(
        BufReader::new(tokio::io::stdin()),
        scheduler.commands(),
        quit.clone(),
    ));
    if config.output_format == OutputFormat::Table {
        eprintln!("{}", console::HELP);
    }

    loop {
        tokio::select! {
            _ = quit.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    error!("Scheduler stopped unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                display(&snapshot, config.output_format);
            }
        }
    }

    scheduler.shutdown().await;
    info!("Indexer status monitor shut down");
    Ok(())
}

fn display(snapshot: &Snapshot, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            // clear the terminal before redrawing the board
            print!("\x1B[2J\x1B[H");
            println!("{}", render::render_snapshot(snapshot));
        }
        OutputFormat::Json => match render::render_json(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize snapshot: {}", e),
        },
    }
}
