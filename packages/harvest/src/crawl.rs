//! Harvesting a single results page.

use listing_harvest_models::{Listing, ListingDraft};
use listing_harvest_scraper::Fetcher;
use listing_harvest_scraper::page::ItemOutcome;
use listing_harvest_store::{RecordStore, StoreError};

use crate::{HarvestError, HarvestProgress, Harvester};

/// Per-page tally of what happened to each listing item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageReport {
    /// New listings stored.
    pub accepted: usize,
    /// Listings skipped because they were already in the store.
    pub known: usize,
    /// Listing items whose markup could not be read.
    pub malformed: usize,
    /// Listings missing a required field.
    pub rejected: usize,
    /// Listings dropped because the thumbnail could not be cached.
    pub image_failures: usize,
}

impl PageReport {
    /// Listings that were seen but neither stored nor already known.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.malformed + self.rejected + self.image_failures
    }
}

impl<F: Fetcher> Harvester<F> {
    /// Fetches one results page and stores every new, complete listing on
    /// it.
    ///
    /// Listing-level problems are counted in the returned [`PageReport`].
    /// The snapshot is checkpointed whenever the store size reaches a
    /// multiple of `save_every`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Scrape`] if the page cannot be fetched, and
    /// [`HarvestError::Store`] if a checkpoint save fails.
    pub async fn crawl_page(
        &self,
        store: &mut RecordStore,
        url: &str,
        progress: &HarvestProgress,
    ) -> Result<PageReport, HarvestError> {
        let html = self.fetcher.fetch_text(url).await?;
        let outcomes = self.parser.parse(&html, |id| store.contains(id));

        let mut report = PageReport::default();

        for outcome in outcomes {
            match outcome {
                ItemOutcome::NotListing => {}
                ItemOutcome::Known(id) => {
                    log::trace!("Skipping known listing {id}");
                    report.known += 1;
                }
                ItemOutcome::Malformed(reason) => {
                    log::debug!("Skipping malformed listing on {url}: {reason}");
                    report.malformed += 1;
                }
                ItemOutcome::Candidate(draft) => {
                    self.harvest_listing(store, draft, &mut report).await?;
                    progress.listings.set_position(store.len() as u64);
                }
            }
        }

        Ok(report)
    }

    async fn harvest_listing(
        &self,
        store: &mut RecordStore,
        draft: ListingDraft,
        report: &mut PageReport,
    ) -> Result<(), HarvestError> {
        let listing = match Listing::try_from(draft) {
            Ok(listing) => listing,
            Err(e) => {
                log::debug!("Skipping incomplete listing: {e}");
                report.rejected += 1;
                return Ok(());
            }
        };

        // The same listing can appear twice on one page.
        if store.contains(&listing.id) {
            report.known += 1;
            return Ok(());
        }

        let image_path = match self
            .images
            .fetch(&self.fetcher, &listing.image_url, &listing.id)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                log::error!("Unable to download image {}: {e}", listing.image_url);
                report.image_failures += 1;
                return Ok(());
            }
        };

        match store.add(listing.with_image_path(&image_path)) {
            Ok(()) => {}
            Err(StoreError::Invalid(e)) => {
                log::warn!("Store rejected listing: {e}");
                report.rejected += 1;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        report.accepted += 1;

        store.save_if_due(self.config.save_every)?;
        Ok(())
    }
}
