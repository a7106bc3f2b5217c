//! Search across all locations of the catalog.
//!
//! Every location is solved in its own blocking task. The number of locations
//! solved at once is bounded by a semaphore sized from the configuration. The
//! caller waits for all tasks; a task that fails or panics only removes its own
//! location from the results.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::catalog::CatalogSnapshot;
use crate::model::{
    Listing, NormalizedVehicle, SearchResponse, ValidationError, VehicleRequest,
    normalize_vehicles,
};
use crate::optimizer::{LocationOutcome, SearchConfig, solve_location};

/// Request-level search failures.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No vehicles provided in request")]
    NoVehicles,
    #[error(transparent)]
    InvalidVehicle(#[from] ValidationError),
}

/// Solver invoked for a single location.
pub type LocationSolver =
    fn(&str, &[Listing], &[NormalizedVehicle], &SearchConfig) -> LocationOutcome;

/// Searches all locations for the cheapest allocation of the requested vehicles.
///
/// # Returns
/// One response per feasible location, sorted by ascending total price. An empty
/// list means no location can hold the vehicles.
pub async fn search_spaces(
    catalog: Arc<CatalogSnapshot>,
    requests: &[VehicleRequest],
    config: SearchConfig,
) -> Result<Vec<SearchResponse>, SearchError> {
    if requests.is_empty() {
        return Err(SearchError::NoVehicles);
    }

    let vehicles = Arc::new(normalize_vehicles(requests, config.cell_size)?);
    info!(
        "🔍 Searching {} locations for {} vehicle types ({} units)",
        catalog.location_count(),
        vehicles.len(),
        vehicles.iter().map(|v| v.quantity as usize).sum::<usize>()
    );

    let results = search_locations(catalog, vehicles, config).await;
    info!("📦 Search finished with {} feasible locations", results.len());
    Ok(results)
}

/// Solves every location with the default solver.
pub async fn search_locations(
    catalog: Arc<CatalogSnapshot>,
    vehicles: Arc<Vec<NormalizedVehicle>>,
    config: SearchConfig,
) -> Vec<SearchResponse> {
    search_locations_with(catalog, vehicles, config, solve_location).await
}

/// Solves every location with a custom solver.
///
/// Results are ordered by price, ties by location id, independent of the order
/// in which the tasks finish.
pub async fn search_locations_with(
    catalog: Arc<CatalogSnapshot>,
    vehicles: Arc<Vec<NormalizedVehicle>>,
    config: SearchConfig,
    solver: LocationSolver,
) -> Vec<SearchResponse> {
    let limiter = Arc::new(Semaphore::new(config.max_parallel_locations.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<tokio::task::Id, String> = HashMap::new();

    for location_id in catalog.listings_by_location().keys() {
        let permit = match Arc::clone(&limiter).acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                error!("❌ location {}: no worker available: {}", location_id, err);
                continue;
            }
        };

        let catalog = Arc::clone(&catalog);
        let vehicles = Arc::clone(&vehicles);
        let location = location_id.clone();
        let handle = tasks.spawn_blocking(move || {
            let _permit = permit;
            let outcome = solver(&location, catalog.listings_at(&location), &vehicles, &config);
            (location, outcome)
        });
        pending.insert(handle.id(), location_id.clone());
    }

    let mut responses = Vec::new();
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, (location_id, outcome))) => {
                pending.remove(&id);
                match outcome {
                    LocationOutcome::Allocated(allocation) => {
                        debug!(
                            "location {}: {} listings for {} cents",
                            location_id,
                            allocation.layouts.len(),
                            allocation.total_price_in_cents
                        );
                        responses.push(allocation.into_response(&location_id));
                    }
                    LocationOutcome::NoSolution => {
                        debug!("location {}: no solution", location_id);
                    }
                    LocationOutcome::Fault(fault) => {
                        error!("❌ location {}: {}", location_id, fault);
                    }
                }
            }
            Err(err) => {
                let location_id = pending.remove(&err.id()).unwrap_or_default();
                error!("❌ location {}: solver task failed: {}", location_id, err);
            }
        }
    }

    responses.sort_by(|a, b| {
        a.total_price_in_cents
            .cmp(&b.total_price_in_cents)
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    responses
}
