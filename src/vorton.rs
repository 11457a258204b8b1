//! The vorton value type.

use glam::Vec3;

/// A discrete vortex element: a point carrying a vorticity vector.
///
/// This is a plain value. Simulation state lives in the double-buffered
/// [`VortonStore`](crate::buffer::VortonStore) indexed by vorton id; octree
/// queries hand out `Vorton` values that are either copies of real vortons or
/// synthetic aggregates summarizing a whole subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vorton {
    /// World position.
    pub position: Vec3,
    /// Local rotation of the fluid at this element.
    pub vorticity: Vec3,
}

impl Vorton {
    /// Create a vorton at the given position with the given vorticity.
    pub fn new(position: Vec3, vorticity: Vec3) -> Self {
        Self { position, vorticity }
    }

    /// True if both position and vorticity are finite in every component.
    ///
    /// Non-finite vortons arise from uninitialized or transient state; the
    /// velocity kernel skips them rather than poisoning the accumulator.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.vorticity.is_finite()
    }
}
