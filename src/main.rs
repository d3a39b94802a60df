use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use backcheck::gateway::{ServerConfig, start_server};
use backcheck::workflow::CaseTimeouts;

#[derive(Parser)]
#[command(name = "backcheck")]
#[command(version, about = "HTTP gateway for background-check case workflows")]
pub struct Cli {
    /// Address the gateway listens on
    #[arg(long, env = "BACKCHECK_LISTEN_ADDR", default_value = "localhost:8081")]
    pub listen_addr: String,

    /// Days the candidate has to respond to the consent request
    #[arg(long, default_value = "7")]
    pub consent_deadline_days: i64,

    /// Days a researcher has to complete each search
    #[arg(long, default_value = "30")]
    pub search_deadline_days: i64,

    /// Seconds between deadline-sweeper runs
    #[arg(long, default_value = "30")]
    pub sweep_interval_secs: u64,

    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("backcheck={default_level}"))),
        )
        .init();

    let config = ServerConfig {
        listen_addr: cli.listen_addr,
        timeouts: CaseTimeouts {
            consent: chrono::Duration::days(cli.consent_deadline_days),
            search: chrono::Duration::days(cli.search_deadline_days),
        },
        sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
    };

    // Non-zero exit on listener failure; zero after a graceful drain.
    start_server(config).await
}
