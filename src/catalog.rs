//! Listing catalog.
//!
//! The catalog is loaded from a JSON file into an immutable [`CatalogSnapshot`]
//! that indexes listings by location and by id. A [`CatalogStore`] hands out
//! the current snapshot and swaps in a new one on reload, so a running search
//! always sees one consistent catalog.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{info, warn};
use thiserror::Error;

use crate::model::{Listing, ValidationError};

/// Errors while loading or accessing the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read listings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse listings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid listing: {0}")]
    InvalidListing(#[from] ValidationError),
    #[error("duplicate listing id '{0}'")]
    DuplicateListing(String),
    #[error("catalog is unavailable")]
    Unavailable,
}

/// Immutable, fully indexed view of the catalog.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    by_location: BTreeMap<String, Vec<Listing>>,
    by_id: HashMap<String, Listing>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from raw listings.
    ///
    /// Listings of each location are ordered by ascending price, ties by id.
    pub fn from_listings(listings: Vec<Listing>) -> Result<Self, CatalogError> {
        let mut by_location: BTreeMap<String, Vec<Listing>> = BTreeMap::new();
        let mut by_id = HashMap::with_capacity(listings.len());

        for listing in listings {
            listing.validate()?;
            if by_id.contains_key(&listing.id) {
                return Err(CatalogError::DuplicateListing(listing.id));
            }
            by_id.insert(listing.id.clone(), listing.clone());
            by_location
                .entry(listing.location_id.clone())
                .or_default()
                .push(listing);
        }

        for listings in by_location.values_mut() {
            listings.sort_by(|a, b| {
                a.price_in_cents
                    .cmp(&b.price_in_cents)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        Ok(Self { by_location, by_id })
    }

    /// Reads and indexes a listings file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let listings: Vec<Listing> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_listings(listings)
    }

    /// All locations with their listings, ordered by location id.
    pub fn listings_by_location(&self) -> &BTreeMap<String, Vec<Listing>> {
        &self.by_location
    }

    /// Listing with the given id.
    pub fn listing(&self, id: &str) -> Option<&Listing> {
        self.by_id.get(id)
    }

    /// Listings of one location, empty for unknown locations.
    pub fn listings_at(&self, location_id: &str) -> &[Listing] {
        self.by_location
            .get(location_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn location_count(&self) -> usize {
        self.by_location.len()
    }

    pub fn listing_count(&self) -> usize {
        self.by_id.len()
    }
}

/// Holder of the current catalog snapshot.
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    /// Loads the listings file and creates the store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        info!("📂 Loading listings from {}", path.display());
        let snapshot = CatalogSnapshot::load(&path)?;
        info!(
            "✅ Loaded {} listings across {} locations",
            snapshot.listing_count(),
            snapshot.location_count()
        );
        Ok(Self::with_snapshot(path, snapshot))
    }

    /// Creates a store around an already built snapshot.
    pub fn with_snapshot(path: impl Into<PathBuf>, snapshot: CatalogSnapshot) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Path of the listings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot that is current right now.
    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| CatalogError::Unavailable)
    }

    /// Reloads the listings file and swaps in the new snapshot.
    ///
    /// On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let snapshot = match CatalogSnapshot::load(&self.path) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                warn!("⚠️ Reload of {} failed: {}", self.path.display(), err);
                return Err(err);
            }
        };

        let mut current = self.current.write().map_err(|_| CatalogError::Unavailable)?;
        *current = Arc::clone(&snapshot);
        info!(
            "🔄 Reloaded {} listings across {} locations",
            snapshot.listing_count(),
            snapshot.location_count()
        );
        Ok(snapshot)
    }
}
