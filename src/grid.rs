//! Cell-based occupancy model for a single listing.
//!
//! A listing's usable area is quantized into `length × width` cells. Vehicles
//! occupy axis-aligned rectangles of cells; two vehicles collide if they share
//! at least one cell.

/// Largest grid the engine allocates, in cells.
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// Occupancy grid of one listing.
///
/// Cells are stored row-major along the length axis: cell `(x, y)` lives at
/// index `x * width + y`.
#[derive(Clone, Debug)]
pub struct ListingGrid {
    length: usize,
    width: usize,
    cells: Vec<bool>,
    occupied_area: usize,
}

impl ListingGrid {
    /// Creates an empty grid of `length × width` cells.
    ///
    /// Returns `None` if the grid would exceed [`MAX_GRID_CELLS`].
    pub fn try_new(length: usize, width: usize) -> Option<Self> {
        let cells = length
            .checked_mul(width)
            .filter(|&cells| cells <= MAX_GRID_CELLS)?;
        Some(Self {
            length,
            width,
            cells: vec![false; cells],
            occupied_area: 0,
        })
    }

    #[cfg(test)]
    pub fn new(length: usize, width: usize) -> Self {
        Self::try_new(length, width).expect("grid within size limit")
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of cells in the grid.
    pub fn total_area(&self) -> usize {
        self.cells.len()
    }

    /// Number of cells already covered by placed vehicles.
    #[allow(dead_code)]
    pub fn occupied_area(&self) -> usize {
        self.occupied_area
    }

    /// Checks whether the rectangle `[x, x + item_length) × [y, y + item_width)`
    /// is inside the grid and completely free.
    ///
    /// Rejects on the running area counter before scanning any cell.
    pub fn can_place(&self, x: usize, y: usize, item_length: usize, item_width: usize) -> bool {
        let (Some(end_x), Some(end_y)) = (x.checked_add(item_length), y.checked_add(item_width))
        else {
            return false;
        };
        if end_x > self.length || end_y > self.width {
            return false;
        }

        let required = item_length.saturating_mul(item_width);
        if self.occupied_area.saturating_add(required) > self.total_area() {
            return false;
        }

        (x..end_x).all(|row| {
            let start = row * self.width;
            self.cells[start + y..start + end_y]
                .iter()
                .all(|occupied| !occupied)
        })
    }

    /// Marks the rectangle as occupied.
    ///
    /// The caller must have confirmed the same rectangle with [`can_place`](Self::can_place).
    pub fn place(&mut self, x: usize, y: usize, item_length: usize, item_width: usize) {
        for row in x..x + item_length {
            let start = row * self.width;
            self.cells[start + y..start + y + item_width].fill(true);
        }
        self.occupied_area += item_length * item_width;
    }

    /// Whether the single cell `(x, y)` is occupied.
    #[allow(dead_code)]
    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        x < self.length && y < self.width && self.cells[x * self.width + y]
    }

    /// Fraction of occupied cells (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        let total = self.total_area();
        if total == 0 {
            return 0.0;
        }
        self.occupied_area as f64 / total as f64
    }
}
