use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;

use ferry::configure::{self, AppConfig};
use ferry::logger;
use ferry::transfer::{Poller, TransferContext};

/// Move files from a polled source store into a destination store
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    config: PathBuf,
}

/// Build both stores, check that they answer, and assemble the poller
async fn connect(config: &AppConfig) -> Result<Poller> {
    let source = config.source.build().context("source store")?;
    source
        .probe()
        .await
        .with_context(|| format!("connect {}", source.name()))?;

    let destination = config.destination.build().context("destination store")?;
    destination
        .probe()
        .await
        .with_context(|| format!("connect {}", destination.name()))?;

    let ctx = TransferContext::new(source, destination, config.destination_folder.clone())
        .with_staging_dir(config.staging_dir.clone())
        .with_retry(config.retry_policy());

    Ok(Poller::new(ctx, config.polling_interval()))
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let config = match configure::load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", args.config.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = logger::setup_logger(&config) {
        eprintln!("Failed to set up logger: {}", e);
        process::exit(1);
    }

    let poller = match connect(&config).await {
        Ok(poller) => poller,
        Err(e) => {
            log::error!("{:#}", e);
            process::exit(1);
        }
    };

    poller.run().await;
}
