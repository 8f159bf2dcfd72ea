use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auction_client::lifecycle::derive_phase;
use auction_client::wallet::{Disconnected, ReadOnlyWriter};
use auction_client::{config, AuctionClient, AuctionId, ClientConfig, GraphQlQueryClient, SystemClock};

#[derive(Parser)]
#[command(name = "auction-client")]
#[command(about = "On-chain English auction client")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "auction-client.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the read-query service endpoint
    #[arg(long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow an auction's countdown until it settles
    Watch {
        /// Auction id; defaults to the newest auction
        #[arg(short, long)]
        auction: Option<AuctionId>,
    },
    /// Print phase, minimum bid and navigation once
    Status {
        #[arg(short, long)]
        auction: Option<AuctionId>,
    },
    /// Write an example configuration file
    InitConfig {
        #[arg(short, long, default_value = "auction-client.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { output } = &cli.command {
        config::create_example_config(output)?;
        println!("Wrote example configuration to {}", output);
        return Ok(());
    }

    // Load configuration
    let mut config = if std::path::Path::new(&cli.config).exists() {
        ClientConfig::from_file(&cli.config)?
    } else {
        warn!("Config file not found, using defaults: {}", cli.config);
        ClientConfig::default()
    };

    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }
    if let Some(endpoint) = cli.endpoint {
        config.query.endpoint = endpoint;
    }

    init_logging(&config)?;
    config.validate()?;

    info!("Starting auction client");
    info!("Query endpoint: {}", config.query.endpoint);

    let query = Arc::new(GraphQlQueryClient::new(&config.query)?);
    let client = AuctionClient::new(
        config,
        query,
        Arc::new(ReadOnlyWriter),
        Arc::new(Disconnected),
        Arc::new(SystemClock),
    );
    if !client.initial_sync().await {
        warn!("No auction data yet; the background poll will keep retrying");
    }

    match cli.command {
        Command::Status { auction } => {
            let id = resolve_auction(&client, auction)?;
            print_status(&client, id)?;
        }
        Command::Watch { auction } => {
            let id = resolve_auction(&client, auction)?;
            watch(&client, id).await;
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

fn resolve_auction(client: &AuctionClient, requested: Option<AuctionId>) -> Result<AuctionId> {
    requested
        .or_else(|| client.repository().max_id())
        .ok_or_else(|| anyhow::anyhow!("No auctions available from the query service"))
}

fn print_status(client: &AuctionClient, id: AuctionId) -> Result<()> {
    let snapshot = client.auction(id)?;
    let now = client.current_ledger_time();
    let navigation = client.navigation(id);

    println!("Auction {}", id);
    println!("  phase:       {}", derive_phase(&snapshot, now));
    println!("  high bid:    {}", snapshot.amount);
    if let Some(bidder) = &snapshot.bidder {
        println!("  bidder:      {}", bidder);
    }
    println!("  minimum bid: {}", client.minimum_next_bid(id)?);
    println!("  ends at:     {}", snapshot.end_time);
    println!("  clock skew:  {}s", client.clock().time_difference());
    println!(
        "  navigation:  prev={} next={}",
        navigation.prev().map_or("-".to_string(), |p| p.to_string()),
        navigation.next().map_or("-".to_string(), |n| n.to_string())
    );
    Ok(())
}

async fn watch(client: &AuctionClient, id: AuctionId) {
    let _background = client.start_background();
    let lifecycle = client.watch_auction(id);
    let mut outcomes = lifecycle.outcomes();

    let printer = async {
        while outcomes.changed().await.is_ok() {
            let latest = outcomes.borrow_and_update().clone();
            if let Some(outcome) = latest {
                info!("Auction {}: {} ({})", outcome.auction_id, outcome.phase, outcome.countdown);
            }
        }
    };

    info!("Watching auction {}. Press Ctrl+C to stop.", id);
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = printer => {
            info!("Auction {} settled", id);
        }
    }

    if lifecycle.engine().end_failed() {
        error!("Auction {} could not be ended; settlement needs a retry", id);
    }
}

fn init_logging(config: &ClientConfig) -> Result<()> {
    let log_level = config
        .monitoring
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("auction_client={}", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}
