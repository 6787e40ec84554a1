#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the listing harvester.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use listing_harvest::{
    DEFAULT_BASE_URL, HarvestConfig, HarvestProgress, Harvester, run_until_interrupted,
};
use listing_harvest_cli_utils::IndicatifProgress;
use listing_harvest_models::SortOrder;
use listing_harvest_scraper::http::{HttpConfig, HttpFetcher};

#[derive(Parser)]
#[command(
    name = "listing_harvest",
    about = "Resumable harvester for classifieds vehicle listings"
)]
struct Cli {
    /// Existing folder where the snapshot and images are stored
    output_folder: PathBuf,
    /// Number of listings to collect (including ones from earlier runs)
    #[arg(long = "num")]
    num: usize,
    /// Crawl from the cheapest listing; otherwise from the most expensive
    #[arg(long)]
    from_cheapest: bool,
    /// Save the snapshot every time this many listings have been collected
    #[arg(long, default_value = "100")]
    save_every: NonZeroUsize,
    /// Maximum number of result pages to visit
    #[arg(long, default_value = "10000")]
    max_pages: u32,
    /// Search results endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
    /// Retries for transient HTTP failures (timeouts, 429, 5xx)
    #[arg(long, default_value = "0")]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = listing_harvest_cli_utils::init_logger();
    let cli = Cli::parse();

    let fetcher = HttpFetcher::new(&HttpConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        max_retries: cli.max_retries,
        ..HttpConfig::default()
    })?;

    let config = HarvestConfig {
        output_folder: cli.output_folder,
        target_count: cli.num,
        sort_order: SortOrder::from_cheapest(cli.from_cheapest),
        save_every: cli.save_every,
        max_pages: cli.max_pages,
        base_url: cli.base_url,
    };
    let harvester = Harvester::new(config, fetcher)?;

    let progress = HarvestProgress {
        pages: IndicatifProgress::pages_bar(&multi, u64::from(cli.max_pages)),
        listings: IndicatifProgress::listings_bar(&multi),
    };

    // Dropping the run future on Ctrl-C releases the store guard, which
    // writes the snapshot before we exit.
    let outcome = run_until_interrupted(harvester.run(&progress), tokio::signal::ctrl_c()).await;

    let Some(result) = outcome else {
        log::warn!(
            "Interrupted; progress saved to {}",
            harvester.config().output_folder.display()
        );
        return Ok(());
    };
    let summary = result?;

    println!(
        "Collected {} new listing(s), {} total ({} known, {} skipped) across {} page(s), {} failed.",
        summary.accepted,
        summary.total_listings,
        summary.known,
        summary.skipped,
        summary.pages_crawled,
        summary.pages_failed,
    );

    Ok(())
}
