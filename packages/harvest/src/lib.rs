#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable harvester for paginated classifieds listings.
//!
//! A [`Harvester`] walks the search results pages in order, turns every new
//! listing into a [`Listing`](listing_harvest_models::Listing) with a cached
//! thumbnail, and records it in the
//! [`RecordStore`](listing_harvest_store::RecordStore). Listings already in
//! the store are skipped, so an interrupted run picks up where it stopped.
//!
//! Failures are contained: a listing whose thumbnail cannot be fetched is
//! dropped, and a page that cannot be fetched or parsed is skipped. Only
//! store failures abort the run.

pub mod crawl;
pub mod run;

#[cfg(test)]
mod test_support;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use listing_harvest_models::SortOrder;
use listing_harvest_scraper::image_cache::ImageCache;
use listing_harvest_scraper::page::PageParser;
use listing_harvest_scraper::progress::{ProgressCallback, null_progress};
use listing_harvest_scraper::{Fetcher, ScrapeError};
use listing_harvest_store::{StoreError, paths};

pub use run::{HarvestSummary, StopReason, page_url, run_until_interrupted};

/// Search endpoint of the classifieds site.
pub const DEFAULT_BASE_URL: &str = "https://auto.ricardo.ch/search/results/";

/// Errors that can occur during a harvest.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The record store could not be opened or saved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A page or image could not be fetched or processed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

/// What to harvest and where to keep it.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Existing folder receiving the snapshot and the `imgs/` tree.
    pub output_folder: PathBuf,
    /// Stop once the store holds at least this many listings.
    pub target_count: usize,
    /// Result ordering requested from the site.
    pub sort_order: SortOrder,
    /// Save the snapshot every time the store size is a multiple of this.
    pub save_every: NonZeroUsize,
    /// Upper bound on the number of result pages visited.
    pub max_pages: u32,
    /// Search endpoint; page and sort parameters are appended.
    pub base_url: String,
}

/// Progress sinks for a run.
#[derive(Clone)]
pub struct HarvestProgress {
    /// Advanced once per visited page.
    pub pages: Arc<dyn ProgressCallback>,
    /// Tracks store size against the target.
    pub listings: Arc<dyn ProgressCallback>,
}

impl HarvestProgress {
    /// Progress sinks that discard every update.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            pages: null_progress(),
            listings: null_progress(),
        }
    }
}

/// Drives a harvest with a given [`Fetcher`].
pub struct Harvester<F> {
    config: HarvestConfig,
    fetcher: F,
    parser: PageParser,
    images: ImageCache,
}

impl<F: Fetcher> Harvester<F> {
    /// Creates a harvester writing into `config.output_folder`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Scrape`] if the page selectors fail to
    /// compile.
    pub fn new(config: HarvestConfig, fetcher: F) -> Result<Self, HarvestError> {
        let images = ImageCache::new(paths::images_dir(&config.output_folder));
        Ok(Self {
            config,
            fetcher,
            parser: PageParser::new()?,
            images,
        })
    }

    /// The configuration this harvester runs with.
    #[must_use]
    pub const fn config(&self) -> &HarvestConfig {
        &self.config
    }
}
