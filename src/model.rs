//! Data models for the space search service.
//!
//! This module defines the fundamental data structures of a search:
//! - `Listing`: A priced storage space at a location, as stored in the catalog
//! - `VehicleRequest`: One demand entry as submitted by a client (raw units)
//! - `NormalizedVehicle`: A demand entry converted to grid cells
//! - `SearchResponse`: The cheapest allocation found at one location

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Width in grid cells assumed for vehicles submitted without a `width`.
///
/// Older clients only send a length; those vehicles occupy a single cell row.
pub const LEGACY_WIDTH_UNITS: usize = 1;

/// Validation error for listings and vehicle requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Converts a raw length into whole grid cells (floor division).
#[inline]
fn to_cells(raw: u32, cell_size: NonZeroU32) -> usize {
    (raw / cell_size.get()) as usize
}

/// A rentable storage space.
///
/// Dimensions are raw units; the packing engine converts them to grid cells
/// using the configured cell size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "listing-1",
        "location_id": "loc-1",
        "length": 600,
        "width": 400,
        "price_in_cents": 12500
    })
)]
pub struct Listing {
    pub id: String,
    pub location_id: String,
    pub length: u32,
    pub width: u32,
    pub price_in_cents: u32,
}

impl Listing {
    /// Checks that the listing can be indexed by the catalog.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier(
                "listing id must not be empty".to_string(),
            ));
        }
        if self.location_id.trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier(format!(
                "listing '{}' has an empty location_id",
                self.id
            )));
        }
        Ok(())
    }

    /// Usable area in grid cells as (length, width).
    pub fn grid_dims(&self, cell_size: NonZeroU32) -> (usize, usize) {
        (
            to_cells(self.length, cell_size),
            to_cells(self.width, cell_size),
        )
    }

    /// Price divided by the usable cell count.
    ///
    /// Listings without a single usable cell rank behind every other listing.
    pub fn price_per_cell(&self, cell_size: NonZeroU32) -> f64 {
        let (length, width) = self.grid_dims(cell_size);
        let cells = length.saturating_mul(width);
        if cells == 0 {
            return f64::INFINITY;
        }
        f64::from(self.price_in_cents) / cells as f64
    }
}

/// A demand entry as submitted by a client.
///
/// # Fields
/// * `length` - Vehicle length in raw units
/// * `width` - Vehicle width in raw units; omitted by legacy clients
/// * `quantity` - Number of identical vehicles
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "length": 100, "width": 50, "quantity": 2 }))]
pub struct VehicleRequest {
    pub length: u32,
    #[serde(default)]
    #[schema(nullable = true)]
    pub width: Option<u32>,
    pub quantity: u32,
}

impl VehicleRequest {
    /// Converts the request into grid cells.
    ///
    /// # Returns
    /// `Ok(NormalizedVehicle)` if both dimensions cover at least one cell and the
    /// quantity is positive, otherwise `Err(ValidationError)`
    pub fn normalize(&self, cell_size: NonZeroU32) -> Result<NormalizedVehicle, ValidationError> {
        if self.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(
                "quantity must be at least 1".to_string(),
            ));
        }

        let length = to_cells(self.length, cell_size);
        if length == 0 {
            return Err(ValidationError::InvalidDimension(format!(
                "length {} is shorter than one grid cell ({})",
                self.length, cell_size
            )));
        }

        let width = match self.width {
            Some(raw) => to_cells(raw, cell_size),
            None => LEGACY_WIDTH_UNITS,
        };
        if width == 0 {
            return Err(ValidationError::InvalidDimension(format!(
                "width {} is narrower than one grid cell ({})",
                self.width.unwrap_or_default(),
                cell_size
            )));
        }

        let area = length.checked_mul(width).ok_or_else(|| {
            ValidationError::InvalidDimension(format!(
                "vehicle of {} x {} cells is too large",
                length, width
            ))
        })?;

        Ok(NormalizedVehicle {
            length,
            width,
            quantity: self.quantity,
            area,
        })
    }
}

/// A vehicle type expressed in grid cells.
///
/// Invariant: `area == length * width` and `quantity >= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedVehicle {
    pub length: usize,
    pub width: usize,
    pub quantity: u32,
    pub area: usize,
}

impl NormalizedVehicle {
    /// Creates a vehicle type from cell dimensions.
    #[allow(dead_code)]
    pub fn new(length: usize, width: usize, quantity: u32) -> Self {
        Self {
            length,
            width,
            quantity,
            area: length * width,
        }
    }
}

/// Normalizes all requests and sorts them by descending area.
///
/// Placing the largest vehicles first keeps the greedy placement from
/// fragmenting the grid early.
pub fn normalize_vehicles(
    requests: &[VehicleRequest],
    cell_size: NonZeroU32,
) -> Result<Vec<NormalizedVehicle>, ValidationError> {
    let mut vehicles = requests
        .iter()
        .map(|request| request.normalize(cell_size))
        .collect::<Result<Vec<_>, _>>()?;
    vehicles.sort_by(|a, b| b.area.cmp(&a.area));
    Ok(vehicles)
}

/// Iterates single vehicle units, one item per unit of every vehicle type.
///
/// `vehicles` must already be sorted by descending area, as returned by
/// [`normalize_vehicles`]; units then come out in the same order. Units are
/// produced lazily, so large quantities never materialize as a list.
pub fn expand_units(vehicles: &[NormalizedVehicle]) -> impl Iterator<Item = &NormalizedVehicle> {
    vehicles
        .iter()
        .flat_map(|vehicle| std::iter::repeat_n(vehicle, vehicle.quantity as usize))
}

/// Total number of cells the demand covers, or `None` on overflow.
pub fn demand_area(vehicles: &[NormalizedVehicle]) -> Option<usize> {
    vehicles.iter().try_fold(0usize, |total, vehicle| {
        vehicle
            .area
            .checked_mul(vehicle.quantity as usize)
            .and_then(|area| total.checked_add(area))
    })
}

/// Cheapest allocation found at one location.
///
/// # Fields
/// * `location_id` - Location all listings belong to
/// * `listing_ids` - Used listings in the order they were opened
/// * `total_price_in_cents` - Sum of the prices of all used listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "locationId": "loc-1",
        "listingIds": ["listing-1"],
        "totalPriceInCents": 12500
    })
)]
pub struct SearchResponse {
    pub location_id: String,
    pub listing_ids: Vec<String>,
    pub total_price_in_cents: u64,
}
