//! The page loop.

use listing_harvest_models::SortOrder;
use listing_harvest_scraper::Fetcher;
use listing_harvest_store::RecordStore;

use crate::crawl::PageReport;
use crate::{HarvestError, HarvestProgress, Harvester};

/// Why a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// The store reached the target count.
    TargetReached,
    /// Every page up to `max_pages` was visited.
    #[default]
    PageLimit,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Pages visited, including failed ones.
    pub pages_crawled: u32,
    /// Pages that could not be fetched or parsed.
    pub pages_failed: u32,
    /// New listings stored during this run.
    pub accepted: usize,
    /// Listings skipped because they were already in the store, whether
    /// from an earlier run or an earlier item on the same page.
    pub known: usize,
    /// Listings dropped as malformed, incomplete, or missing an image.
    pub skipped: usize,
    /// Store size when the run ended.
    pub total_listings: usize,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

impl HarvestSummary {
    fn absorb(&mut self, report: &PageReport) {
        self.accepted += report.accepted;
        self.known += report.known;
        self.skipped += report.skipped();
    }
}

/// Builds the URL of results page `page` in the given order.
#[must_use]
pub fn page_url(base_url: &str, page: u32, sort_order: SortOrder) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}pn={page}&po={}", sort_order.code())
}

/// Awaits `run` unless `interrupt` resolves first.
///
/// Returns `None` when interrupted. The `run` future is dropped before
/// returning, so anything it holds (such as a [`StoreGuard`]) is released by
/// then. If `interrupt` fails, for example because no signal handler can be
/// installed, the error is logged and `run` is awaited to completion.
///
/// [`StoreGuard`]: listing_harvest_store::StoreGuard
pub async fn run_until_interrupted<T>(
    run: impl Future<Output = T>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Option<T> {
    let mut run = Box::pin(run);

    let signal = tokio::select! {
        output = &mut run => return Some(output),
        signal = interrupt => signal,
    };

    match signal {
        Ok(()) => {
            drop(run);
            None
        }
        Err(e) => {
            log::error!("Unable to listen for interrupts, running to completion: {e}");
            Some(run.await)
        }
    }
}

impl<F: Fetcher> Harvester<F> {
    /// Runs the harvest until the target is met or the page budget is
    /// spent.
    ///
    /// The store is loaded from the output folder first and saved on every
    /// exit path, so dropping this future part-way still persists what was
    /// harvested.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Store`] if the store cannot be opened or
    /// saved. Page-level failures are logged and counted instead.
    pub async fn run(&self, progress: &HarvestProgress) -> Result<HarvestSummary, HarvestError> {
        let config = &self.config;
        let mut store = RecordStore::open(&config.output_folder)?;
        let mut summary = HarvestSummary::default();

        log::info!(
            "Harvesting up to {} listing(s) ({} first, {} page(s) max) into {}",
            config.target_count,
            config.sort_order,
            config.max_pages,
            config.output_folder.display()
        );
        progress.listings.set_total(config.target_count as u64);
        progress.listings.set_position(store.len() as u64);

        for page in 0..config.max_pages {
            if store.len() >= config.target_count {
                break;
            }

            let url = page_url(&config.base_url, page, config.sort_order);
            match self.crawl_page(&mut store, &url, progress).await {
                Ok(report) => {
                    log::debug!(
                        "Page {page}: {} new, {} known, {} skipped",
                        report.accepted,
                        report.known,
                        report.skipped()
                    );
                    summary.absorb(&report);
                }
                Err(HarvestError::Scrape(e)) => {
                    log::error!("Unable to crawl page {url}: {e}");
                    summary.pages_failed += 1;
                }
                Err(e) => return Err(e),
            }

            summary.pages_crawled += 1;
            progress.pages.inc(1);
            progress
                .pages
                .set_message(format!("{} listing(s)", store.len()));
        }

        summary.total_listings = store.len();
        summary.stop_reason = if store.len() >= config.target_count {
            StopReason::TargetReached
        } else {
            StopReason::PageLimit
        };
        store.close()?;

        progress
            .pages
            .finish(format!("{} page(s) visited", summary.pages_crawled));
        progress
            .listings
            .finish(format!("{} listing(s) stored", summary.total_listings));
        log::info!(
            "Harvest finished ({:?}): {} new, {} known, {} skipped, {} total",
            summary.stop_reason,
            summary.accepted,
            summary.known,
            summary.skipped,
            summary.total_listings
        );

        Ok(summary)
    }
}
