//! In-memory site used by the harvester tests.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use listing_harvest_models::SortOrder;
use listing_harvest_scraper::{Fetcher, ScrapeError};

use crate::HarvestConfig;

pub const BASE_URL: &str = "http://site.test/results/";

/// A results page and thumbnail server backed by a map of URLs.
pub struct FakeSite {
    pages: BTreeMap<String, String>,
    png: Vec<u8>,
    page_requests: AtomicUsize,
    image_requests: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Self {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 120, 200]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        Self {
            pages: BTreeMap::new(),
            png,
            page_requests: AtomicUsize::new(0),
            image_requests: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_owned(), html);
        self
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> usize {
        self.image_requests.load(Ordering::SeqCst)
    }
}

impl Fetcher for FakeSite {
    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::Parse(format!("no page at {url}")))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        self.image_requests.fetch_add(1, Ordering::SeqCst);
        if url.contains("broken") {
            return Err(ScrapeError::Parse(format!("no image at {url}")));
        }
        Ok(self.png.clone())
    }
}

/// One `<li>` on a generated results page.
pub struct ListingFixture {
    id: String,
    price: Option<u64>,
    broken_image: bool,
}

impl ListingFixture {
    pub fn new(id: &str, price: u64) -> Self {
        Self {
            id: id.to_owned(),
            price: Some(price),
            broken_image: false,
        }
    }

    pub const fn with_broken_image(mut self) -> Self {
        self.broken_image = true;
        self
    }

    pub const fn without_price(mut self) -> Self {
        self.price = None;
        self
    }
}

/// Renders a results page in the site's markup.
pub fn results_page(listings: &[ListingFixture]) -> String {
    let mut html = String::from("<html><body><ul class=\"results\">\n");
    for listing in listings {
        let id = &listing.id;
        let image = if listing.broken_image {
            format!("broken-{id}")
        } else {
            id.clone()
        };
        let _ = write!(
            html,
            "<li class=\"ric-article clearfix\" data-target=\"/de/a/make{id}/model{id}/trim/{id}/\">\
             <div class=\"ric-offer-image\"><div data-image-src=\"//img.test/{image}.jpg\"></div></div>",
        );
        if let Some(price) = listing.price {
            let _ = write!(
                html,
                "<div class=\"ric-price-container\"><ul><li>CHF</li><li>{}'{:03}</li></ul></div>",
                price / 1000,
                price % 1000,
            );
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul></body></html>");
    html
}

pub fn config_for(dir: &Path, target_count: usize) -> HarvestConfig {
    HarvestConfig {
        output_folder: dir.to_path_buf(),
        target_count,
        sort_order: SortOrder::MostExpensive,
        save_every: NonZeroUsize::new(100).unwrap(),
        max_pages: 10,
        base_url: BASE_URL.to_owned(),
    }
}

pub fn fresh_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "listing_harvest_test_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
