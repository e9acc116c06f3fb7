mod config;
mod logging;
mod models;
mod output;
mod pipeline;
mod scraper;
mod utils;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing::instrument::WithSubscriber;

use crate::config::AppConfig;
use crate::output::Destination;
use crate::pipeline::{Pipeline, RetryPolicy};
use crate::scraper::cleaner::root_symbol;
use crate::scraper::{OptionChainClient, YahooScraper};

#[derive(Parser)]
#[command(
    name = "grab-opt-chain",
    about = "Grab option chain data, especially implied volatility",
    version
)]
struct Cli {
    /// Write <root>-ivol-<YYYYMMDD>.csv into DIR
    #[arg(short = 'x', long = "export-dir", value_name = "DIR", conflicts_with = "output")]
    export_dir: Option<PathBuf>,

    /// Underlying symbol, e.g. ^XDE (default from config)
    symbol: Option<String>,

    /// Write CSV to this file instead of stdout
    output: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn destination(&self, root: &str, trade_date: NaiveDate) -> Destination {
        match (&self.export_dir, &self.output) {
            (Some(dir), _) => Destination::File(output::export_path(dir, root, trade_date)),
            (None, Some(file)) => Destination::File(file.clone()),
            (None, None) => Destination::Stdout,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dispatch = logging::build_dispatch(cli.verbose);
    run(cli).with_subscriber(dispatch).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load()?;

    let symbol = cli
        .symbol
        .clone()
        .unwrap_or_else(|| config.output.default_symbol.clone());
    let trade_date = Local::now().date_naive();
    let destination = cli.destination(root_symbol(&symbol), trade_date);

    let _t = utils::Timer::start(format!("option chain for {}", symbol));

    let scraper = YahooScraper::new(&config.scraper).context("Failed to build scraper")?;
    let client = OptionChainClient::new(scraper, trade_date);
    let pipeline = Pipeline::new(client, RetryPolicy::from(&config.retry));

    let out = match pipeline.run(&symbol).await {
        Ok(out) => out,
        Err(e) => {
            error!("Aborting {}: {} ({} error)", symbol, e, e.kind());
            return Err(e).with_context(|| {
                format!(
                    "Failed to grab option chain for {} after {} attempts",
                    symbol, config.retry.max_attempts
                )
            });
        }
    };

    let document = output::encode(&out.rows)?;
    destination.write(&document)?;
    Ok(())
}
