//! Bottom-left placement heuristic.
//!
//! Candidate anchors are visited row by row starting at `y = 0`, and inside a
//! row from `x = 0` upward. The first free anchor wins, so the heuristic never
//! backtracks and its result is fully deterministic.

use crate::grid::ListingGrid;
use crate::model::NormalizedVehicle;

/// Position and orientation of a committed vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: usize,
    pub y: usize,
    /// Extent along the grid's length axis after rotation.
    pub length: usize,
    /// Extent along the grid's width axis after rotation.
    pub width: usize,
    pub rotated: bool,
}

impl Placement {
    /// Checks whether two placements share at least one cell.
    pub fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.x + other.length
            && other.x < self.x + self.length
            && self.y < other.y + other.width
            && other.y < self.y + self.width
    }
}

/// All anchors at which an item of the given extent stays inside the grid,
/// in bottom-left order (`y` ascending, then `x` ascending).
fn bottom_left_anchors(
    grid_length: usize,
    grid_width: usize,
    item_length: usize,
    item_width: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let max_x = grid_length.checked_sub(item_length);
    let max_y = grid_width.checked_sub(item_width);
    let (max_x, max_y, in_bounds) = match (max_x, max_y) {
        (Some(max_x), Some(max_y)) => (max_x, max_y, true),
        _ => (0, 0, false),
    };

    (0..=max_y)
        .filter(move |_| in_bounds)
        .flat_map(move |y| (0..=max_x).map(move |x| (x, y)))
}

/// Places the item at the first free bottom-left anchor in a fixed orientation.
fn try_bottom_left(
    grid: &mut ListingGrid,
    item_length: usize,
    item_width: usize,
) -> Option<(usize, usize)> {
    let anchor = bottom_left_anchors(grid.length(), grid.width(), item_length, item_width)
        .find(|&(x, y)| grid.can_place(x, y, item_length, item_width))?;
    grid.place(anchor.0, anchor.1, item_length, item_width);
    Some(anchor)
}

/// Places one unit of `vehicle` into the grid.
///
/// Tries the original orientation first and, if `allow_rotation` is set and the
/// vehicle is not square, the orientation rotated by 90°.
///
/// # Returns
/// `Some(Placement)` with the grid updated, or `None` with the grid untouched
pub fn place_vehicle(
    grid: &mut ListingGrid,
    vehicle: &NormalizedVehicle,
    allow_rotation: bool,
) -> Option<Placement> {
    let (length, width) = (vehicle.length, vehicle.width);

    if let Some((x, y)) = try_bottom_left(grid, length, width) {
        return Some(Placement {
            x,
            y,
            length,
            width,
            rotated: false,
        });
    }

    if allow_rotation && length != width {
        if let Some((x, y)) = try_bottom_left(grid, width, length) {
            return Some(Placement {
                x,
                y,
                length: width,
                width: length,
                rotated: true,
            });
        }
    }

    None
}
