#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable record store for harvested listings.
//!
//! The [`RecordStore`] keeps every accepted [`Listing`] keyed by id and
//! persists them as a pretty-printed JSON snapshot inside the output
//! folder. Re-running a harvest loads the snapshot first so already-seen
//! listings are skipped.
//!
//! Use [`RecordStore::open`] to get a [`StoreGuard`]: it loads on open and
//! saves on every exit path, including `?` propagation and panics.

pub mod paths;

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use listing_harvest_models::{Listing, ListingError};

/// Errors that can occur while loading, saving, or mutating the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The output folder does not exist or is not a directory.
    #[error("Invalid folder: {}", path.display())]
    InvalidFolder {
        /// The rejected folder.
        path: PathBuf,
    },

    /// I/O error reading or writing the snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be parsed or serialized.
    #[error("Snapshot error in {}: {source}", path.display())]
    Snapshot {
        /// The snapshot file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A listing failed validation and was not added.
    #[error("Invalid listing: {0}")]
    Invalid(#[from] ListingError),

    /// A snapshot entry is stored under a key other than its own id.
    #[error("Snapshot entry {key:?} holds listing {id:?}")]
    IdMismatch {
        /// Key of the entry in the snapshot.
        key: String,
        /// Id of the listing stored under it.
        id: String,
    },
}

/// In-memory listing registry backed by a JSON snapshot.
#[derive(Debug)]
pub struct RecordStore {
    folder: PathBuf,
    listings: HashMap<String, Listing>,
}

impl RecordStore {
    /// Creates an empty store rooted at `folder`.
    ///
    /// Nothing is read from disk; call [`Self::load`] or use
    /// [`Self::open`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidFolder`] if `folder` is not an existing
    /// directory.
    pub fn new(folder: &Path) -> Result<Self, StoreError> {
        if !folder.is_dir() {
            return Err(StoreError::InvalidFolder {
                path: folder.to_path_buf(),
            });
        }

        Ok(Self {
            folder: folder.to_path_buf(),
            listings: HashMap::new(),
        })
    }

    /// Creates a store for `folder`, loads its snapshot, and wraps it in a
    /// guard that saves when it goes out of scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the folder is invalid or the existing
    /// snapshot cannot be read.
    pub fn open(folder: &Path) -> Result<StoreGuard, StoreError> {
        let mut store = Self::new(folder)?;
        store.load()?;
        log::info!(
            "Loaded {} listing(s) from {}",
            store.len(),
            store.snapshot_path().display()
        );
        Ok(StoreGuard {
            store,
            closed: false,
        })
    }

    /// Path of the JSON snapshot.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        paths::snapshot_path(&self.folder)
    }

    /// Replaces the in-memory listings with the snapshot contents.
    ///
    /// A missing snapshot leaves the store empty. On error the store is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Snapshot`] if the file is not a valid snapshot,
    /// [`StoreError::Invalid`] or [`StoreError::IdMismatch`] if an entry
    /// would not have been accepted by [`Self::add`], or [`StoreError::Io`]
    /// if it cannot be read.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let path = self.snapshot_path();
        if !path.is_file() {
            log::debug!("No snapshot at {}, starting empty", path.display());
            self.listings.clear();
            return Ok(());
        }

        let reader = BufReader::new(File::open(&path)?);
        let listings: HashMap<String, Listing> = serde_json::from_reader(reader)
            .map_err(|source| StoreError::Snapshot { path, source })?;

        for (key, listing) in &listings {
            listing.validate()?;
            if *key != listing.id {
                return Err(StoreError::IdMismatch {
                    key: key.clone(),
                    id: listing.id.clone(),
                });
            }
        }

        self.listings = listings;
        Ok(())
    }

    /// Writes every listing to the snapshot.
    ///
    /// The snapshot is written to a temporary sibling and renamed over the
    /// previous one, so an interrupted save leaves the old snapshot intact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or any file operation fails.
    pub fn save(&self) -> Result<(), StoreError> {
        let path = self.snapshot_path();
        let tmp_path = paths::snapshot_tmp_path(&self.folder);

        // Sorted so snapshots diff cleanly between runs.
        let sorted: BTreeMap<&str, &Listing> = self
            .listings
            .iter()
            .map(|(id, listing)| (id.as_str(), listing))
            .collect();

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, &sorted).map_err(|source| {
            StoreError::Snapshot {
                path: tmp_path.clone(),
                source,
            }
        })?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        std::fs::rename(&tmp_path, &path)?;
        log::debug!("Saved {} listing(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Adds a listing, replacing any previous entry with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the listing fails validation; the
    /// store is left unchanged.
    pub fn add(&mut self, listing: Listing) -> Result<(), StoreError> {
        listing.validate()?;
        self.listings.insert(listing.id.clone(), listing);
        Ok(())
    }

    /// Saves if the current size is a multiple of `every`.
    ///
    /// Returns `true` when a save happened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the save fails.
    pub fn save_if_due(&self, every: NonZeroUsize) -> Result<bool, StoreError> {
        if self.len() % every.get() != 0 {
            return Ok(false);
        }
        self.save()?;
        log::info!("Checkpoint: {} listing(s) saved", self.len());
        Ok(true)
    }

    /// Returns `true` if a listing with this id has already been harvested.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.listings.contains_key(id)
    }

    /// Looks up a listing by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.listings.get(id)
    }

    /// Number of listings harvested so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Returns `true` if no listings have been harvested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// A [`RecordStore`] that saves itself when dropped.
///
/// Prefer [`StoreGuard::close`] on the happy path so save errors reach the
/// caller; the drop path can only log them.
#[derive(Debug)]
pub struct StoreGuard {
    store: RecordStore,
    closed: bool,
}

impl StoreGuard {
    /// Saves the store and consumes the guard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the final save fails.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.store.save()
    }
}

impl Deref for StoreGuard {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for StoreGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.store.save() {
            log::error!(
                "Failed to save {} on exit: {e}",
                self.store.snapshot_path().display()
            );
        }
    }
}
