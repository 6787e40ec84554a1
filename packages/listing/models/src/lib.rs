#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Harvested listing record types.
//!
//! A [`Listing`] is the unit persisted by the record store. The page parser
//! produces loosely-populated [`ListingDraft`]s which only become listings
//! once the required fields (`id`, `price`, `image_url`) are present.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors raised when a listing is missing required data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    /// A required field was never populated.
    #[error("A listing must have a {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A required text field is present but empty.
    #[error("Listing field {field} must not be empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },
}

/// Order in which the listing search returns results.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    /// Cheapest listings first.
    Cheapest,
    /// Most expensive listings first.
    #[default]
    MostExpensive,
}

impl SortOrder {
    /// Returns the numeric code the listing search expects for this order.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Cheapest => 2,
            Self::MostExpensive => 3,
        }
    }

    /// Picks the order selected by the `--from-cheapest` flag.
    #[must_use]
    pub const fn from_cheapest(from_cheapest: bool) -> Self {
        if from_cheapest {
            Self::Cheapest
        } else {
            Self::MostExpensive
        }
    }
}

/// One harvested listing.
///
/// Field names on disk follow the snapshot format (`car_id`, `car_price`,
/// ...), which is shared with snapshots written by earlier crawler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Site identifier, unique per listing.
    #[serde(rename = "car_id")]
    pub id: String,
    /// Model segment of the listing path.
    #[serde(rename = "car_model", default)]
    pub model: String,
    /// Category segment of the listing path.
    #[serde(rename = "car_type", default)]
    pub category: String,
    /// Absolute URL of the listing thumbnail.
    #[serde(rename = "car_img_url")]
    pub image_url: String,
    /// Asking price with thousands separators removed.
    #[serde(rename = "car_price")]
    pub price: u64,
    /// Where the thumbnail was cached locally, once downloaded.
    #[serde(
        rename = "car_img_path",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_path: Option<PathBuf>,
}

impl Listing {
    /// Creates a listing from its required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::EmptyField`] if `id` or `image_url` is empty.
    pub fn new(
        id: impl Into<String>,
        price: u64,
        image_url: impl Into<String>,
    ) -> Result<Self, ListingError> {
        let listing = Self {
            id: id.into(),
            model: String::new(),
            category: String::new(),
            image_url: image_url.into(),
            price,
            image_path: None,
        };
        listing.validate()?;
        Ok(listing)
    }

    /// Sets the model and category parsed from the listing path.
    #[must_use]
    pub fn with_details(mut self, model: impl Into<String>, category: impl Into<String>) -> Self {
        self.model = model.into();
        self.category = category.into();
        self
    }

    /// Records where the thumbnail was cached.
    #[must_use]
    pub fn with_image_path(mut self, path: &Path) -> Self {
        self.image_path = Some(path.to_path_buf());
        self
    }

    /// Checks that the required text fields are non-empty.
    ///
    /// Fields are public, so the store re-checks listings on insert rather
    /// than trusting construction alone.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::EmptyField`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ListingError> {
        if self.id.trim().is_empty() {
            return Err(ListingError::EmptyField { field: "id" });
        }
        if self.image_url.trim().is_empty() {
            return Err(ListingError::EmptyField { field: "image url" });
        }
        Ok(())
    }
}

/// A listing as scraped from a page, before required fields are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDraft {
    /// Site identifier.
    pub id: Option<String>,
    /// Model segment of the listing path.
    pub model: Option<String>,
    /// Category segment of the listing path.
    pub category: Option<String>,
    /// Parsed price.
    pub price: Option<u64>,
    /// Normalized image URL.
    pub image_url: Option<String>,
}

impl TryFrom<ListingDraft> for Listing {
    type Error = ListingError;

    fn try_from(draft: ListingDraft) -> Result<Self, Self::Error> {
        let id = draft.id.ok_or(ListingError::MissingField { field: "id" })?;
        let price = draft
            .price
            .ok_or(ListingError::MissingField { field: "price" })?;
        let image_url = draft
            .image_url
            .ok_or(ListingError::MissingField { field: "image url" })?;

        Ok(Self::new(id, price, image_url)?.with_details(
            draft.model.unwrap_or_default(),
            draft.category.unwrap_or_default(),
        ))
    }
}
