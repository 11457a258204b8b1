//! Per-item stage computations.
//!
//! Each function here is the body of one work item: it reads back-buffer
//! state (and the published tree snapshot), computes the stage update, and
//! writes the result into the front buffer at the item's own index. The
//! `scratch` vector is the worker's reusable influence buffer, so the hot
//! path never allocates once it has warmed up.

use crate::buffer::VortonStore;
use crate::constants::DT;
use crate::kernel;
use crate::octree::VortonTree;
use crate::vorton::Vorton;

/// Stretch/tilt one vorton: rotate and stretch its vorticity along the
/// local velocity gradient, `vorticity += (J * vorticity) * DT`.
pub(crate) fn stretch_and_tilt_vorton(
    store: &VortonStore,
    tree: &VortonTree,
    id: u32,
    scratch: &mut Vec<Vorton>,
) {
    let position = store.position(id as usize);
    scratch.clear();
    tree.influential_vortons(position, None, scratch);

    let jacobian = kernel::jacobian_at(position, scratch);
    let vorticity = store.vorticity(id as usize);
    store.set_vorticity(id as usize, vorticity + (jacobian * vorticity) * DT);
}

/// Advect one vorton along the field velocity at its position, excluding
/// its own influence.
pub(crate) fn advect_vorton(
    store: &VortonStore,
    tree: &VortonTree,
    id: u32,
    scratch: &mut Vec<Vorton>,
) {
    let position = store.position(id as usize);
    scratch.clear();
    tree.influential_vortons(position, Some(id), scratch);

    let velocity = kernel::velocity_at(position, scratch);
    store.set_position(id as usize, position + velocity * DT);
}

/// Diffuse vorticity within one leaf group.
///
/// Vortons in the same octree leaf are treated as close enough to exchange
/// vorticity with no cross-leaf coupling: a deliberate locality
/// approximation, O(group^2) per leaf, with leaf size set by tree depth.
/// Each member takes a viscosity-weighted share of its neighbors' vorticity
/// difference and then decays by `1 - viscosity * DT`.
pub(crate) fn diffuse_group(store: &VortonStore, group: &[u32], viscosity: f32) {
    for &v in group {
        let own = store.vorticity(v as usize);
        let mut accum = glam::Vec3::ZERO;
        for &w in group {
            if w == v {
                continue;
            }
            accum += (store.vorticity(w as usize) - own) * viscosity;
        }
        let diffused = (own + accum * DT) * (1.0 - viscosity * DT);
        store.set_vorticity(v as usize, diffused);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn store_with(vortons: &[(Vec3, Vec3)]) -> VortonStore {
        let store = VortonStore::new(vortons.len());
        for (i, &(p, w)) in vortons.iter().enumerate() {
            store.initialize(i, p, w);
        }
        store.swap();
        store
    }

    #[test]
    fn test_advection_moves_with_the_field() {
        let store = store_with(&[
            (Vec3::ZERO, Vec3::Z * 10.0),
            (Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO),
        ]);
        let tree = VortonTree::build(&store, 2);
        let mut scratch = Vec::new();

        advect_vorton(&store, &tree, 1, &mut scratch);
        store.swap();

        let moved = store.position(1);
        // The z-aligned vorton at the origin swirls vorton 1 along +y.
        assert!(moved.y > 0.0, "expected +y drift, got {:?}", moved);
        assert!((moved - Vec3::new(1.0, 0.0, 0.0)).length() < 0.1, "one step should move a little, not teleport");
    }

    #[test]
    fn test_advection_excludes_self() {
        // A lone vorton induces no velocity on itself.
        let store = store_with(&[(Vec3::ONE, Vec3::X * 5.0)]);
        let tree = VortonTree::build(&store, 2);
        let mut scratch = Vec::new();

        advect_vorton(&store, &tree, 0, &mut scratch);
        store.swap();
        assert_eq!(store.position(0), Vec3::ONE);
    }

    #[test]
    fn test_diffusion_contracts_vorticity_difference() {
        let store = store_with(&[
            (Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)),
            (Vec3::new(0.05, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
        ]);
        let before = (store.vorticity(0) - store.vorticity(1)).length();

        diffuse_group(&store, &[0, 1], 0.5);
        store.swap();

        let after = (store.vorticity(0) - store.vorticity(1)).length();
        assert!(after < before, "diffusion should pull vorticities together: {} !< {}", after, before);
    }

    #[test]
    fn test_diffusion_damps_uniform_vorticity() {
        // Equal vorticities exchange nothing; only the leak term applies.
        let w = Vec3::new(0.0, 0.0, 2.0);
        let store = store_with(&[(Vec3::ZERO, w), (Vec3::X * 0.05, w)]);

        diffuse_group(&store, &[0, 1], 0.5);
        store.swap();

        let expected = w * (1.0 - 0.5 * DT);
        assert!((store.vorticity(0) - expected).length() < 1e-6);
        assert!((store.vorticity(1) - expected).length() < 1e-6);
    }

    #[test]
    fn test_stretch_and_tilt_bounded_for_mild_field() {
        let store = store_with(&[
            (Vec3::ZERO, Vec3::Z),
            (Vec3::new(0.5, 0.0, 0.0), Vec3::Y * 0.5),
        ]);
        let tree = VortonTree::build(&store, 2);
        let mut scratch = Vec::new();

        stretch_and_tilt_vorton(&store, &tree, 1, &mut scratch);
        store.swap();

        let updated = store.vorticity(1);
        assert!(updated.is_finite());
        // One fixed step of a weak strain field nudges vorticity, it does
        // not replace it.
        assert!((updated - Vec3::Y * 0.5).length() < 0.5);
    }
}
