use crate::error::AccessError;

/// Identifier of a core. Ids are assigned row-major across the grid starting at zero.
pub type CoreId = usize;

/// Grid coordinate of a core.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    /// Manhattan distance between two grid positions.
    pub fn distance_to(&self, other: &Position) -> u64 {
        (self.x.abs_diff(other.x) + self.y.abs_diff(other.y)) as u64
    }
}

/// The `Topology` struct is the fixed placement of cores on a rectangular mesh. It is immutable
/// once built and exists purely to answer "how far apart are these two cores" and "is this a
/// real core".
#[derive(Debug, Clone)]
pub struct Topology {
    dim_x: usize,
    dim_y: usize,
    positions: Vec<Position>,
}

impl Topology {
    /// Create a `dim_x` by `dim_y` grid, numbering cores row-major.
    ///
    /// # Arguments
    ///
    /// * `dim_x` - number of columns.
    /// * `dim_y` - number of rows.
    pub fn build(dim_x: usize, dim_y: usize) -> Self {
        let positions = (0..dim_y)
            .flat_map(|y| (0..dim_x).map(move |x| Position { x, y }))
            .collect();
        Self {
            dim_x,
            dim_y,
            positions,
        }
    }

    pub fn core_count(&self) -> usize {
        self.positions.len()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.dim_x, self.dim_y)
    }

    /// Look up the position of a core, rejecting ids outside the grid.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::CoreOutOfRange` when `core` does not name a core of this grid.
    pub fn position(&self, core: CoreId) -> Result<Position, AccessError> {
        self.positions
            .get(core)
            .copied()
            .ok_or(AccessError::CoreOutOfRange {
                core,
                cores: self.positions.len(),
            })
    }

    /// Manhattan distance between two cores.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::CoreOutOfRange` if either id is outside the grid.
    pub fn distance(&self, a: CoreId, b: CoreId) -> Result<u64, AccessError> {
        Ok(self.position(a)?.distance_to(&self.position(b)?))
    }
}
