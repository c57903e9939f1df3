// mlodato, 20190318

use super::geom::Aabb;

pub trait Containment<RHS = Self> {
    fn contains(self, other: RHS) -> bool;
}

/// The geometry of a body, as far as the index is concerned
///
/// The index never inspects the concrete shape; it asks whether cached world coordinates are
/// stale, requests a refresh when they are, and then reads the resulting world-space extents.

pub trait Shape {
    /// Whether world-space coordinates must be recomputed before `extents` may be trusted
    fn needs_refresh(&self) -> bool {
        false
    }

    /// Recompute world-space coordinates from the current pose
    fn refresh(&mut self) {}

    /// Tight (unpadded) world-space bounds
    fn extents(&self) -> Aabb;

    /// Refreshes stale coordinates, then returns tight world-space bounds
    fn current_extents(&mut self) -> Aabb {
        if self.needs_refresh() {
            self.refresh();
        }
        self.extents()
    }
}
