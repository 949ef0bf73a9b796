use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use updraft::collaborators::{
    LoggingRefreshExecutor, MemoryDuplicateChecker, MemoryProductSink, StaticAuthority,
};
use updraft::config::Config;
use updraft::service::GovernanceService;

#[derive(Parser)]
#[command(
    name = "updraft",
    version,
    about = "Admin governance core for daily content refreshes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the processor and insertion trigger loops with demo collaborators
    Run {
        /// Owner admin id registered with the demo authority
        #[arg(long, default_value = "owner-1")]
        owner: String,

        /// Additional admin ids registered with the demo authority
        #[arg(long)]
        admin: Vec<String>,
    },

    /// Print the resolved configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(std::path::Path::new(path))?,
        None => Config::from_env()?,
    };

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Run { owner, admin } => run(config, owner, admin).await,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { &config.logging.level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("updraft={level}")));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn run(config: Config, owner: String, admins: Vec<String>) -> Result<()> {
    let mut authority = StaticAuthority::new().with_owner(&owner);
    for admin in &admins {
        authority = authority.with_admin(admin);
    }

    let service = Arc::new(GovernanceService::new(
        config,
        Arc::new(authority),
        Arc::new(LoggingRefreshExecutor::new()),
        Arc::new(MemoryProductSink::new()),
        Arc::new(MemoryDuplicateChecker::new()),
    ));

    let processor = service.processor();
    let insertion = service.insertion();

    let processor_task = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.run().await }
    });
    let insertion_task = tokio::spawn({
        let insertion = Arc::clone(&insertion);
        async move { insertion.run().await }
    });

    info!(owner = %owner, admins = admins.len() + 1, "governance core running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    processor.stop().await;
    insertion.stop().await;
    let _ = tokio::join!(processor_task, insertion_task);

    let stats = service.processor_stats().await;
    info!(
        total = stats.total_executions,
        successful = stats.successful_executions,
        "final processor stats at {}",
        Utc::now()
    );
    Ok(())
}
