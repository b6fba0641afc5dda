mod config;
mod error;
mod provider;
mod runner;
mod thunder;
mod wait;

use crate::config::{PollConfig, ThunderConfig, DEFAULT_BASE_URL};
use crate::runner::{deploy_on_thunder, destroy_on_thunder};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The CLI interface to bring a Dagger runner up on Thunder Compute and tear it down again.
#[derive(Debug, Parser)]
#[command(name = "thunder")]
#[command(about = "Run a Dagger engine on a Thunder Compute GPU instance", long_about = None)]
struct Cli {
    /// Thunder API token
    #[arg(
        long,
        env = "TNR_API_TOKEN",
        hide_env_values = true,
        default_value = "",
        hide_default_value = true,
        global = true
    )]
    token: String,

    /// Host of the Thunder API, or a full URL including the scheme
    #[arg(long, env = "THUNDER_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an instance and print the export line for `_EXPERIMENTAL_DAGGER_RUNNER_HOST`
    Deploy {
        /// Seconds between two status checks while the instance starts
        #[arg(long, env = "THUNDER_POLL_INTERVAL_SECS", default_value_t = 5,
            value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval_secs: u64,
        /// Give up after this many status checks
        #[arg(long, env = "THUNDER_MAX_ATTEMPTS")]
        max_attempts: Option<u32>,
        /// Give up after waiting this long for the instance
        #[arg(long, env = "THUNDER_DEADLINE_SECS")]
        deadline_secs: Option<u64>,
    },
    /// Delete an instance created by `deploy`
    Destroy {
        /// Instance ID printed by `deploy`
        #[arg(long, env = "THUNDER_INSTANCE_ID")]
        instance_id: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();
    let mut config = ThunderConfig::default().with_base_url(args.base_url);

    match args.command {
        Commands::Deploy {
            poll_interval_secs,
            max_attempts,
            deadline_secs,
        } => {
            config.poll = PollConfig {
                interval: Duration::from_secs(poll_interval_secs),
                max_attempts,
                deadline: deadline_secs.map(Duration::from_secs),
            };
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping the deploy");
                    on_interrupt.cancel();
                }
            });

            let deployment = deploy_on_thunder(&config, &args.token, &cancel).await?;
            info!(instance_id = %deployment.instance_id, "Dagger runner deployed");
            eprintln!("Instance ID: {}", deployment.instance_id);
            println!("{}", deployment.host);
        }
        Commands::Destroy { instance_id } => {
            destroy_on_thunder(&config, &args.token, &instance_id).await?;
            info!(instance_id = %instance_id, "Dagger runner destroyed");
        }
    }
    Ok(())
}
