//! Command-line interface for cta-stations
//!
//! # Usage Examples
//!
//! ```bash
//! # Consume cta_stations and maintain the station table until Ctrl-C
//! cta-stations stream \
//!   --brokers localhost:9092 \
//!   --schema-registry-url http://localhost:8081 \
//!   --flush-timeout 3s
//!
//! # Create the input topic ahead of the capture connector
//! cta-stations provision --topic cta_stations --partitions 1 --replication-factor 1
//!
//! # Dump the station table as JSON lines
//! cta-stations table --output-topic cta_stations_transformed
//! ```

use clap::{Parser, Subcommand};
use cta_stations::{ProvisionArgs, StreamArgs, TableArgs};

#[derive(Parser)]
#[command(name = "cta-stations")]
#[command(about = "Streams CTA station reference data into a changelog-backed station table")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stream agent over the input topic
    Stream(StreamArgs),

    /// Ensure a topic exists
    Provision(ProvisionArgs),

    /// Rebuild the station table from its changelog and print it
    Table(TableArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stream(args) => {
            let stats = cta_stations::run_stream(args).await?;
            tracing::info!(
                "Processed {} records ({} written to the station table)",
                stats.consumed,
                stats.written
            );
        }
        Commands::Provision(args) => {
            let topic = args.topic.clone();
            cta_stations::provision(args).await?;
            println!("Topic '{topic}' is provisioned");
        }
        Commands::Table(args) => {
            for station in cta_stations::read_table(args).await? {
                println!("{}", serde_json::to_string(&station)?);
            }
        }
    }

    Ok(())
}
