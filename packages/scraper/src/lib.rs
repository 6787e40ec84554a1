#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scraping building blocks for the listing harvester.
//!
//! - [`http`]: a [`Fetcher`] backed by `reqwest` with an explicit timeout
//!   and retry count.
//! - [`page`]: extracts [`ListingDraft`](listing_harvest_models::ListingDraft)s
//!   from a search results page.
//! - [`image_cache`]: stores thumbnails under an MD5-sharded directory tree,
//!   skipping downloads that are already on disk.
//! - [`progress`]: rendering-agnostic progress reporting.
//!
//! This crate knows nothing about the record store. Callers decide which
//! listings are already known and what to persist.

pub mod http;
pub mod image_cache;
pub mod page;
pub mod progress;

use std::future::Future;

/// Errors that can occur while fetching or processing a page or image.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status returned by the server.
        status: reqwest::StatusCode,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoding or encoding an image failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Parsing markup or a selector failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A blocking task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Source of page markup and image bytes.
///
/// [`http::HttpFetcher`] is the production implementation; tests substitute
/// an in-memory fake.
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the request fails or the body is not text.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, ScrapeError>> + Send;

    /// Fetches `url` and returns the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the request fails.
    fn fetch_bytes(&self, url: &str)
    -> impl Future<Output = Result<Vec<u8>, ScrapeError>> + Send;
}
