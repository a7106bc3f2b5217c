//! Allocation logic for placing vehicles into listings of one location.
//!
//! Two greedy strategies are combined:
//! - Single listing: the cheapest listing that holds every vehicle on its own
//! - Multiple listings: units are spread over listings ranked by price per cell,
//!   reusing already opened listings before paying for another one
//!
//! Both strategies drive the bottom-left heuristic from [`crate::placement`].

use std::num::NonZeroU32;

use log::{debug, trace};
use thiserror::Error;

use crate::grid::{ListingGrid, MAX_GRID_CELLS};
use crate::model::{Listing, NormalizedVehicle, SearchResponse, demand_area, expand_units};
use crate::placement::{Placement, place_vehicle};

/// Configuration for the search engine.
#[derive(Copy, Clone, Debug)]
pub struct SearchConfig {
    /// Raw units per grid cell edge
    pub cell_size: NonZeroU32,
    /// Whether vehicles may be turned by 90°
    pub allow_rotation: bool,
    /// Upper bound for locations solved at the same time
    pub max_parallel_locations: usize,
}

impl SearchConfig {
    pub const DEFAULT_CELL_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();
    pub const DEFAULT_ALLOW_ROTATION: bool = true;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Number of worker threads the machine offers, at least 1.
    pub fn default_parallelism() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cell_size: Self::DEFAULT_CELL_SIZE,
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
            max_parallel_locations: Self::default_parallelism(),
        }
    }
}

/// Builder for SearchConfig.
#[derive(Clone, Debug, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Sets the cell size.
    pub fn cell_size(mut self, cell_size: NonZeroU32) -> Self {
        self.config.cell_size = cell_size;
        self
    }

    /// Enables or disables 90° rotation.
    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    /// Sets the number of locations solved concurrently (at least 1).
    pub fn max_parallel_locations(mut self, limit: usize) -> Self {
        self.config.max_parallel_locations = limit.max(1);
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// Vehicles committed to one listing.
#[derive(Clone, Debug)]
pub struct ListingLayout {
    pub listing_id: String,
    pub price_in_cents: u32,
    pub placements: Vec<Placement>,
    pub utilization: f64,
}

/// A complete allocation of every vehicle unit at one location.
#[derive(Clone, Debug)]
pub struct Allocation {
    /// One layout per used listing, in the order the listings were opened.
    pub layouts: Vec<ListingLayout>,
    pub total_price_in_cents: u64,
}

impl Allocation {
    /// IDs of the used listings in open order.
    #[allow(dead_code)]
    pub fn listing_ids(&self) -> Vec<String> {
        self.layouts.iter().map(|l| l.listing_id.clone()).collect()
    }

    /// Total number of placed vehicle units.
    pub fn placed_units(&self) -> usize {
        self.layouts.iter().map(|l| l.placements.len()).sum()
    }

    /// Whether the allocation uses exactly one listing.
    #[allow(dead_code)]
    pub fn is_single_listing(&self) -> bool {
        self.layouts.len() == 1
    }

    /// Converts the allocation into the response for a location.
    pub fn into_response(self, location_id: &str) -> SearchResponse {
        SearchResponse {
            location_id: location_id.to_string(),
            listing_ids: self.layouts.into_iter().map(|l| l.listing_id).collect(),
            total_price_in_cents: self.total_price_in_cents,
        }
    }
}

/// Internal failure while solving one location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationFault {
    #[error("total price overflowed after {opened} listings")]
    PriceOverflow { opened: usize },
    #[error("allocation placed {placed} units but {expected} were requested")]
    UnitCountMismatch { expected: usize, placed: usize },
    #[error("placements overlap in listing '{listing_id}'")]
    OverlappingPlacements { listing_id: String },
    #[error("listing '{listing_id}' exceeds the grid limit of {} cells", MAX_GRID_CELLS)]
    OversizedListing { listing_id: String },
}

/// Outcome of the search at one location.
///
/// `NoSolution` and `Fault` both exclude the location from the results; they
/// are kept apart so faults can be logged as errors.
#[derive(Clone, Debug)]
pub enum LocationOutcome {
    Allocated(Allocation),
    NoSolution,
    Fault(AllocationFault),
}

impl LocationOutcome {
    /// Returns the allocation, if any.
    #[allow(dead_code)]
    pub fn allocation(self) -> Option<Allocation> {
        match self {
            LocationOutcome::Allocated(allocation) => Some(allocation),
            LocationOutcome::NoSolution | LocationOutcome::Fault(_) => None,
        }
    }
}

/// Places every unit of every vehicle into a fresh grid of `listing`.
///
/// # Returns
/// `Some(ListingLayout)` if all units fit, `None` at the first unit that does not
fn fit_all_vehicles(
    listing: &Listing,
    vehicles: &[NormalizedVehicle],
    config: &SearchConfig,
) -> Option<ListingLayout> {
    let (length, width) = listing.grid_dims(config.cell_size);
    if demand_area(vehicles)? > length.saturating_mul(width) {
        return None;
    }
    let mut grid = ListingGrid::try_new(length, width)?;
    let mut placements = Vec::new();

    for vehicle in vehicles {
        for _ in 0..vehicle.quantity {
            let placement = place_vehicle(&mut grid, vehicle, config.allow_rotation)?;
            placements.push(placement);
        }
    }

    Some(ListingLayout {
        listing_id: listing.id.clone(),
        price_in_cents: listing.price_in_cents,
        placements,
        utilization: grid.utilization(),
    })
}

/// Finds the cheapest listing that holds all vehicles on its own.
///
/// Listings are tried in ascending price order, so the first success is the
/// cheapest single-listing allocation.
///
/// # Parameters
/// * `listings` - Listings of one location
/// * `vehicles` - Vehicle types sorted by descending area
pub fn find_single_listing(
    listings: &[Listing],
    vehicles: &[NormalizedVehicle],
    config: &SearchConfig,
) -> Option<Allocation> {
    let mut by_price: Vec<&Listing> = listings.iter().collect();
    by_price.sort_by_key(|listing| listing.price_in_cents);

    by_price.into_iter().find_map(|listing| {
        let layout = fit_all_vehicles(listing, vehicles, config);
        if layout.is_none() {
            trace!("listing {} cannot hold all vehicles", listing.id);
        }
        layout.map(|layout| Allocation {
            total_price_in_cents: u64::from(layout.price_in_cents),
            layouts: vec![layout],
        })
    })
}

/// Listing opened during a multi-listing allocation.
struct OpenedListing<'a> {
    listing: &'a Listing,
    grid: ListingGrid,
    placements: Vec<Placement>,
}

impl OpenedListing<'_> {
    fn into_layout(self) -> ListingLayout {
        ListingLayout {
            listing_id: self.listing.id.clone(),
            price_in_cents: self.listing.price_in_cents,
            placements: self.placements,
            utilization: self.grid.utilization(),
        }
    }
}

/// Spreads single vehicle units over several listings.
///
/// Each unit goes into the first already opened listing that accepts it. Only
/// if none does, the best ranked unopened listing that accepts the unit is
/// opened and its price is charged once.
///
/// # Parameters
/// * `listings` - Listings of one location, in any order
/// * `units` - Single vehicle units sorted by descending area
///
/// # Returns
/// `Ok(None)` if some unit fits nowhere, `Err` on an internal fault
pub fn find_multi_listing<'u>(
    listings: &[Listing],
    units: impl IntoIterator<Item = &'u NormalizedVehicle>,
    config: &SearchConfig,
) -> Result<Option<Allocation>, AllocationFault> {
    let mut ranked: Vec<&Listing> = listings.iter().collect();
    ranked.sort_by(|a, b| {
        a.price_per_cell(config.cell_size)
            .total_cmp(&b.price_per_cell(config.cell_size))
    });

    let mut is_open = vec![false; ranked.len()];
    let mut opened: Vec<OpenedListing<'_>> = Vec::new();
    let mut total_price: u64 = 0;

    for unit in units {
        let reused = opened.iter_mut().any(|open| {
            match place_vehicle(&mut open.grid, unit, config.allow_rotation) {
                Some(placement) => {
                    open.placements.push(placement);
                    true
                }
                None => false,
            }
        });
        if reused {
            continue;
        }

        let mut newly_opened = None;
        for (idx, &listing) in ranked.iter().enumerate() {
            if is_open[idx] {
                continue;
            }
            let (length, width) = listing.grid_dims(config.cell_size);
            let Some(mut grid) = ListingGrid::try_new(length, width) else {
                continue;
            };
            if let Some(placement) = place_vehicle(&mut grid, unit, config.allow_rotation) {
                newly_opened = Some((
                    idx,
                    OpenedListing {
                        listing,
                        grid,
                        placements: vec![placement],
                    },
                ));
                break;
            }
        }

        let Some((idx, open)) = newly_opened else {
            debug!(
                "no listing accepts a {}x{} unit, giving up",
                unit.length, unit.width
            );
            return Ok(None);
        };

        total_price = total_price
            .checked_add(u64::from(open.listing.price_in_cents))
            .ok_or(AllocationFault::PriceOverflow {
                opened: opened.len(),
            })?;
        trace!("opened listing {}", open.listing.id);
        is_open[idx] = true;
        opened.push(open);
    }

    if opened.is_empty() {
        return Ok(None);
    }

    Ok(Some(Allocation {
        layouts: opened.into_iter().map(OpenedListing::into_layout).collect(),
        total_price_in_cents: total_price,
    }))
}

/// Checks that an allocation holds exactly the requested units without overlap.
fn verify_allocation(
    allocation: &Allocation,
    vehicles: &[NormalizedVehicle],
) -> Result<(), AllocationFault> {
    let expected: usize = vehicles.iter().map(|v| v.quantity as usize).sum();
    let placed = allocation.placed_units();
    if placed != expected {
        return Err(AllocationFault::UnitCountMismatch { expected, placed });
    }

    for layout in &allocation.layouts {
        let overlapping = layout.placements.iter().enumerate().any(|(i, a)| {
            layout.placements[i + 1..]
                .iter()
                .any(|b| a.overlaps(b))
        });
        if overlapping {
            return Err(AllocationFault::OverlappingPlacements {
                listing_id: layout.listing_id.clone(),
            });
        }
    }
    Ok(())
}

/// Total cells of all listings, refusing listings beyond the grid limit.
fn location_capacity(
    listings: &[Listing],
    config: &SearchConfig,
) -> Result<usize, AllocationFault> {
    listings.iter().try_fold(0usize, |total, listing| {
        let (length, width) = listing.grid_dims(config.cell_size);
        match length.checked_mul(width) {
            Some(cells) if cells <= MAX_GRID_CELLS => Ok(total.saturating_add(cells)),
            _ => Err(AllocationFault::OversizedListing {
                listing_id: listing.id.clone(),
            }),
        }
    })
}

/// Finds the allocation for one location.
///
/// Demand that exceeds the combined capacity of the location is rejected
/// before any grid is built. Otherwise tries a single listing first and falls
/// back to multiple listings.
pub fn solve_location(
    location_id: &str,
    listings: &[Listing],
    vehicles: &[NormalizedVehicle],
    config: &SearchConfig,
) -> LocationOutcome {
    let capacity = match location_capacity(listings, config) {
        Ok(capacity) => capacity,
        Err(fault) => return LocationOutcome::Fault(fault),
    };
    match demand_area(vehicles) {
        Some(demand) if demand <= capacity => {}
        _ => {
            debug!(
                "location {}: demand exceeds {} cells of capacity",
                location_id, capacity
            );
            return LocationOutcome::NoSolution;
        }
    }

    let allocation = match find_single_listing(listings, vehicles, config) {
        Some(allocation) => {
            debug!(
                "location {}: single listing {} fits all vehicles",
                location_id,
                allocation.layouts[0].listing_id
            );
            allocation
        }
        None => {
            match find_multi_listing(listings, expand_units(vehicles), config) {
                Ok(Some(allocation)) => {
                    debug!(
                        "location {}: {} listings needed",
                        location_id,
                        allocation.layouts.len()
                    );
                    allocation
                }
                Ok(None) => return LocationOutcome::NoSolution,
                Err(fault) => return LocationOutcome::Fault(fault),
            }
        }
    };

    if let Err(fault) = verify_allocation(&allocation, vehicles) {
        return LocationOutcome::Fault(fault);
    }

    for layout in &allocation.layouts {
        trace!(
            "location {}: listing {} at {:.1}% utilization",
            location_id,
            layout.listing_id,
            layout.utilization * 100.0
        );
    }
    LocationOutcome::Allocated(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str, length: u32, width: u32, price: u32) -> Listing {
        Listing {
            id: id.to_string(),
            location_id: "loc".to_string(),
            length,
            width,
            price_in_cents: price,
        }
    }

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn three_squares_fit_into_one_listing() {
        let listings = vec![listing("big", 600, 400, 5000)];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 3)];

        let outcome = solve_location("loc", &listings, &vehicles, &config());
        let allocation = outcome.allocation().expect("allocation expected");
        assert_eq!(allocation.listing_ids(), vec!["big".to_string()]);
        assert_eq!(allocation.total_price_in_cents, 5000);
        assert_eq!(allocation.placed_units(), 3);
    }

    #[test]
    fn single_listing_picks_cheapest_that_holds_everything() {
        let listings = vec![
            listing("large", 400, 400, 9000),
            listing("small", 200, 100, 1000),
            listing("medium", 300, 100, 4000),
        ];
        // Four 10x10 cell vehicles: small holds two, medium three, large sixteen.
        let vehicles = vec![NormalizedVehicle::new(10, 10, 4)];

        let allocation = find_single_listing(&listings, &vehicles, &config()).unwrap();
        assert!(allocation.is_single_listing());
        assert_eq!(allocation.listing_ids(), vec!["large".to_string()]);
        assert_eq!(allocation.total_price_in_cents, 9000);
    }

    #[test]
    fn prefers_single_listing_over_cheaper_mix() {
        let listings = vec![listing("a", 100, 100, 100), listing("b", 300, 100, 1000)];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 3)];

        let allocation = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        assert_eq!(allocation.listing_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn multi_listing_reuses_opened_listings_first() {
        let listings = vec![listing("a", 200, 100, 200), listing("b", 200, 100, 300)];
        let vehicles = [NormalizedVehicle::new(10, 10, 4)];

        let allocation = find_multi_listing(&listings, expand_units(&vehicles), &config())
            .unwrap()
            .unwrap();
        assert_eq!(allocation.listing_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(allocation.total_price_in_cents, 500);
        assert_eq!(allocation.layouts[0].placements.len(), 2);
        assert_eq!(allocation.layouts[1].placements.len(), 2);
    }

    #[test]
    fn multi_listing_ranks_by_price_per_cell() {
        // "dense" costs more in total but less per cell than "sparse".
        let listings = vec![listing("sparse", 100, 100, 100), listing("dense", 400, 100, 200)];
        let vehicles = [NormalizedVehicle::new(10, 10, 1)];

        let allocation = find_multi_listing(&listings, expand_units(&vehicles), &config())
            .unwrap()
            .unwrap();
        assert_eq!(allocation.listing_ids(), vec!["dense".to_string()]);
        assert_eq!(allocation.total_price_in_cents, 200);
    }

    #[test]
    fn combines_listings_when_none_holds_everything() {
        let listings = vec![listing("a", 100, 100, 100), listing("b", 100, 100, 150)];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 2)];

        let allocation = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        assert_eq!(allocation.layouts.len(), 2);
        assert_eq!(allocation.total_price_in_cents, 250);
        assert_eq!(allocation.placed_units(), 2);
    }

    #[test]
    fn price_counts_each_listing_once() {
        let listings = vec![listing("a", 300, 100, 700), listing("b", 100, 100, 100)];
        // "b" ranks first per cell but holds one unit, "a" holds three.
        let vehicles = vec![NormalizedVehicle::new(10, 10, 5)];

        let allocation = solve_location("loc", &listings, &vehicles, &config())
            .allocation();
        assert!(allocation.is_none(), "four cells cannot hold five units");

        let vehicles = vec![NormalizedVehicle::new(10, 10, 4)];
        let allocation = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        let charged: u64 = allocation
            .layouts
            .iter()
            .map(|l| u64::from(l.price_in_cents))
            .sum();
        assert_eq!(allocation.total_price_in_cents, charged);
        assert_eq!(allocation.total_price_in_cents, 800);
    }

    #[test]
    fn demand_beyond_capacity_has_no_solution() {
        let listings = vec![listing("a", 100, 100, 100), listing("b", 100, 100, 100)];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 3)];

        let outcome = solve_location("loc", &listings, &vehicles, &config());
        assert!(matches!(outcome, LocationOutcome::NoSolution));
    }

    #[test]
    fn huge_quantity_is_rejected_without_expanding_units() {
        let listings = vec![listing("a", 100, 100, 100)];
        let vehicles = vec![NormalizedVehicle::new(1, 1, u32::MAX)];

        let outcome = solve_location("loc", &listings, &vehicles, &config());
        assert!(matches!(outcome, LocationOutcome::NoSolution));
    }

    #[test]
    fn oversized_listing_is_a_fault() {
        let listings = vec![listing("huge", u32::MAX, u32::MAX, 100)];
        let vehicles = vec![NormalizedVehicle::new(1, 1, 1)];

        let outcome = solve_location("loc", &listings, &vehicles, &config());
        assert!(matches!(
            outcome,
            LocationOutcome::Fault(AllocationFault::OversizedListing { ref listing_id })
                if listing_id == "huge"
        ));
    }

    #[test]
    fn vehicle_larger_than_every_listing_has_no_solution() {
        let listings = vec![listing("a", 50, 50, 100)];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 1)];

        let outcome = solve_location("loc", &listings, &vehicles, &config());
        assert!(matches!(outcome, LocationOutcome::NoSolution));
    }

    #[test]
    fn location_without_listings_has_no_solution() {
        let vehicles = vec![NormalizedVehicle::new(1, 1, 1)];
        let outcome = solve_location("loc", &[], &vehicles, &config());
        assert!(matches!(outcome, LocationOutcome::NoSolution));
    }

    #[test]
    fn rotation_setting_controls_fit() {
        let listings = vec![listing("narrow", 20, 50, 100)];
        let vehicles = vec![NormalizedVehicle::new(5, 2, 1)];

        let with_rotation = solve_location("loc", &listings, &vehicles, &config());
        assert!(matches!(with_rotation, LocationOutcome::Allocated(_)));

        let no_rotation = SearchConfig::builder().allow_rotation(false).build();
        let without_rotation = solve_location("loc", &listings, &vehicles, &no_rotation);
        assert!(matches!(without_rotation, LocationOutcome::NoSolution));
    }

    #[test]
    fn allocations_never_overlap_and_place_every_unit() {
        let listings = vec![
            listing("a", 300, 200, 300),
            listing("b", 250, 250, 400),
            listing("c", 500, 100, 350),
        ];
        let vehicles = vec![
            NormalizedVehicle::new(12, 6, 2),
            NormalizedVehicle::new(8, 5, 3),
            NormalizedVehicle::new(4, 4, 5),
        ];

        let allocation = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        assert!(verify_allocation(&allocation, &vehicles).is_ok());
        assert_eq!(allocation.placed_units(), 10);
    }

    #[test]
    fn verify_detects_missing_units() {
        let allocation = Allocation {
            layouts: vec![ListingLayout {
                listing_id: "a".into(),
                price_in_cents: 1,
                placements: vec![],
                utilization: 0.0,
            }],
            total_price_in_cents: 1,
        };
        let vehicles = vec![NormalizedVehicle::new(1, 1, 1)];
        assert_eq!(
            verify_allocation(&allocation, &vehicles),
            Err(AllocationFault::UnitCountMismatch {
                expected: 1,
                placed: 0
            })
        );
    }

    #[test]
    fn solving_twice_yields_identical_allocations() {
        let listings = vec![
            listing("a", 200, 100, 200),
            listing("b", 200, 100, 200),
            listing("c", 300, 100, 250),
        ];
        let vehicles = vec![NormalizedVehicle::new(10, 10, 5)];

        let first = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        let second = solve_location("loc", &listings, &vehicles, &config())
            .allocation()
            .unwrap();
        assert_eq!(first.listing_ids(), second.listing_ids());
        assert_eq!(first.total_price_in_cents, second.total_price_in_cents);
    }

    #[test]
    fn builder_clamps_parallelism() {
        let config = SearchConfig::builder().max_parallel_locations(0).build();
        assert_eq!(config.max_parallel_locations, 1);
    }
}
