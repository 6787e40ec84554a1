//! Search results page parser.
//!
//! Each listing on a results page is an `<li class="ric-article clearfix">`
//! whose `data-target` attribute is the listing path, e.g.
//! `/de/a/volkswagen/golf/1-4-tsi/1234567/`. The id, model, and category
//! are read at fixed offsets from the end of that path.
//!
//! Inside the item, a `div.ric-offer-image` carries the thumbnail in its
//! first nested div's `data-image-src`, and a `div.ric-price-container`
//! holds the price in the second `<li>` of its list.

use listing_harvest_models::ListingDraft;
use scraper::{ElementRef, Html, Selector};

use crate::ScrapeError;

/// Class list that marks a listing `<li>`, in order.
const LISTING_CLASSES: [&str; 2] = ["ric-article", "clearfix"];
const IMAGE_CLASS: &str = "ric-offer-image";
const PRICE_CLASS: &str = "ric-price-container";

/// What happened to one `<li>` on a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new listing; the image still has to be downloaded.
    Candidate(ListingDraft),
    /// The listing id has already been harvested.
    Known(String),
    /// The element is not a listing item.
    NotListing,
    /// The element looked like a listing but could not be read.
    Malformed(String),
}

/// Pre-compiled selectors for results pages.
#[derive(Debug)]
pub struct PageParser {
    item: Selector,
    div: Selector,
    list: Selector,
    list_item: Selector,
}

impl PageParser {
    /// Compiles the selectors used to walk a results page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if a selector fails to compile.
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            item: parse_selector("li")?,
            div: parse_selector("div")?,
            list: parse_selector("ul")?,
            list_item: parse_selector("li")?,
        })
    }

    /// Classifies every `<li>` in `html`.
    ///
    /// `is_known` is consulted with each listing id before anything else is
    /// extracted, so already-harvested listings cost nothing further.
    #[must_use]
    pub fn parse(&self, html: &str, is_known: impl Fn(&str) -> bool) -> Vec<ItemOutcome> {
        let document = Html::parse_document(html);
        document
            .select(&self.item)
            .map(|item| self.parse_item(item, &is_known))
            .collect()
    }

    fn parse_item(&self, item: ElementRef<'_>, is_known: &impl Fn(&str) -> bool) -> ItemOutcome {
        let is_listing = item
            .value()
            .attr("class")
            .is_some_and(|classes| classes.split_whitespace().eq(LISTING_CLASSES));
        if !is_listing {
            return ItemOutcome::NotListing;
        }

        let Some(target) = item.value().attr("data-target") else {
            return ItemOutcome::NotListing;
        };

        let Some(path) = ListingPath::parse(target) else {
            return ItemOutcome::Malformed(format!("unexpected listing path '{target}'"));
        };

        if is_known(path.id) {
            return ItemOutcome::Known(path.id.to_owned());
        }

        let mut draft = ListingDraft {
            id: Some(path.id.to_owned()),
            model: Some(path.model.to_owned()),
            category: Some(path.category.to_owned()),
            ..ListingDraft::default()
        };

        for div in item.select(&self.div) {
            let has_class = |name: &str| div.value().classes().any(|c| c == name);

            if has_class(IMAGE_CLASS) {
                if let Some(src) = div
                    .select(&self.div)
                    .next()
                    .and_then(|inner| inner.value().attr("data-image-src"))
                {
                    draft.image_url = Some(normalize_image_url(src));
                }
            } else if has_class(PRICE_CLASS) {
                let text = div
                    .select(&self.list)
                    .next()
                    .and_then(|list| list.select(&self.list_item).nth(1))
                    .map(|li| li.text().collect::<String>());

                if let Some(raw) = text {
                    let Some(price) = parse_price(&raw) else {
                        return ItemOutcome::Malformed(format!(
                            "unparseable price '{}' for listing {}",
                            raw.trim(),
                            path.id
                        ));
                    };
                    draft.price = Some(price);
                }
            }
        }

        ItemOutcome::Candidate(draft)
    }
}

/// The positional segments of a listing's `data-target` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingPath<'a> {
    /// Listing id (second-to-last segment).
    pub id: &'a str,
    /// Model (fourth segment from the end).
    pub model: &'a str,
    /// Category (fifth segment from the end).
    pub category: &'a str,
}

impl<'a> ListingPath<'a> {
    /// Splits `target` on `/` and picks the id, model, and category
    /// segments. Returns `None` if the path is too short or the id is
    /// empty.
    #[must_use]
    pub fn parse(target: &'a str) -> Option<Self> {
        let segments: Vec<&str> = target.split('/').collect();
        let from_end = |n: usize| segments.len().checked_sub(n).map(|i| segments[i]);

        let id = from_end(2).filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            model: from_end(4)?,
            category: from_end(5)?,
        })
    }
}

/// Turns a protocol-relative image URL (`//host/path`) into an absolute
/// `http:` URL. Absolute URLs are returned unchanged.
#[must_use]
pub fn normalize_image_url(src: &str) -> String {
    let src = src.trim();
    if src.starts_with("//") {
        format!("http:{src}")
    } else {
        src.to_owned()
    }
}

/// Parses a price such as `12'500`, ignoring whitespace and apostrophe
/// thousands separators.
#[must_use]
pub fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}') && !c.is_whitespace())
        .collect();
    digits.parse().ok()
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}
