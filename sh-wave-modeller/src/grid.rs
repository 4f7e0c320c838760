use crate::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nz: usize, // Number of depth levels (rows)
    pub nx: usize, // Number of horizontal samples (columns)
    pub dz: Real,  // Depth step (meters)
    pub dx: Real,  // Horizontal step (meters)
}

impl Grid {
    pub fn new(nz: usize, nx: usize, dz: Real, dx: Real) -> Self {
        Grid { nz, nx, dz, dx }
    }

    /// Physical size `(depth, width)` covered by the cells, in meters.
    pub fn extent(&self) -> (Real, Real) {
        (self.nz as Real * self.dz, self.nx as Real * self.dx)
    }

    pub fn in_bounds(&self, iz: usize, ix: usize) -> bool {
        iz < self.nz && ix < self.nx
    }

    /// Grid cell of a physical position, truncating toward zero.
    ///
    /// Returns `None` for negative or non-finite coordinates. The cell may
    /// still lie outside the grid; bounds are the source kernel's concern.
    pub fn cell_of(&self, z: Real, x: Real) -> Option<(usize, usize)> {
        let iz = (z / self.dz).trunc();
        let ix = (x / self.dx).trunc();
        if !iz.is_finite() || !ix.is_finite() || iz < 0.0 || ix < 0.0 {
            return None;
        }
        Some((iz as usize, ix as usize))
    }
}
