//! Vorton distribution and vorticity injection.
//!
//! These are one-time setup passes: closed-form, per-vorton, and
//! embarrassingly parallel, so they run under rayon. Every pass writes
//! through `VortonStore::initialize` (both buffers) and finishes with a
//! swap, so the first tick observes the initialized values regardless of
//! which buffer is in front.

use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;
use rayon::prelude::*;

use crate::buffer::VortonStore;

/// Scatter vortons randomly inside a randomly scaled unit corner region
/// with small random vorticity. Useful mostly for chaos.
pub(crate) fn randomize_vortons(store: &VortonStore) {
    (0..store.len()).into_par_iter().for_each(|i| {
        let mut rng = rand::thread_rng();
        let scale: f32 = rng.gen();
        let position = Vec3::new(
            rng.gen::<f32>() * scale,
            rng.gen::<f32>() * scale,
            rng.gen::<f32>() * scale,
        );
        let vorticity = Vec3::new(
            rng.gen::<f32>() * 0.5,
            rng.gen::<f32>() * 0.5,
            rng.gen::<f32>() * 0.5,
        );
        store.initialize(i, position, vorticity);
    });
    store.swap();
}

/// Lay vortons out on an even grid inside the given bounding box, with
/// cube-root(count) vortons per axis and zeroed vorticity.
///
/// If the vorton count is not a perfect cube the remainder past the largest
/// whole grid keeps its current state.
pub(crate) fn distribute_vortons(store: &VortonStore, min: Vec3, max: Vec3) {
    let per_side_f = (store.len() as f32).cbrt();
    let mut per_side = per_side_f as usize;
    // cbrt of a perfect cube can land just under the integer; round back up.
    if (per_side + 1) * (per_side + 1) * (per_side + 1) <= store.len() {
        per_side += 1;
    }
    if per_side == 0 {
        return;
    }
    let step = (max - min) / per_side_f;
    let grid_total = (per_side * per_side * per_side).min(store.len());

    (0..grid_total).into_par_iter().for_each(|idx| {
        let y = idx / (per_side * per_side);
        let x = (idx / per_side) % per_side;
        let z = idx % per_side;
        let position = min
            + Vec3::new(
                step.x * x as f32,
                step.y * y as f32,
                step.z * z as f32,
            );
        store.initialize(idx, position, Vec3::ZERO);
    });
    store.swap();
}

/// Inject a vortex ring: vortons within `thickness` of the ring core gain
/// cosine-profiled vorticity along the azimuthal direction, everything else
/// is zeroed.
pub(crate) fn inject_vortex_ring(
    store: &VortonStore,
    radius: f32,
    thickness: f32,
    strength: f32,
    direction: Vec3,
    center: Vec3,
) {
    (0..store.len()).into_par_iter().for_each(|i| {
        let position = store.position(i);
        let from_center = position - center;
        let along = from_center.dot(direction);
        let pt_on_axis = center + direction * along;
        let rho = position - pt_on_axis;
        let rho_len = rho.length();

        let rad_core = ((rho_len - radius) * (rho_len - radius) + along * along).sqrt();

        let vorticity = if rad_core < thickness {
            let profile = 0.5 * ((PI * rad_core / thickness).cos() + 1.0);
            let phi_hat = direction.cross(rho.normalize_or_zero());
            store.vorticity(i) + phi_hat * (profile * strength)
        } else {
            Vec3::ZERO
        };
        store.initialize(i, position, vorticity);
    });
    store.swap();
}

/// Inject a jet ring: an annulus of azimuthal vorticity with a streamwise
/// cosine profile and a radial sine profile. Vortons outside the annulus
/// keep their vorticity.
pub(crate) fn inject_jet_ring(
    store: &VortonStore,
    radius: f32,
    thickness: f32,
    height: f32,
    strength: f32,
    direction: Vec3,
    center: Vec3,
) {
    let radius_outer = radius + thickness;
    (0..store.len()).into_par_iter().for_each(|i| {
        let position = store.position(i);
        let from_center = position - center;
        let along = from_center.dot(direction);
        let pt_on_axis = center + direction * along;
        let rho = position - pt_on_axis;
        let rho_len = rho.length();

        let mut vorticity = store.vorticity(i);
        if rho_len > radius && rho_len < radius_outer {
            let streamwise = if along.abs() < height {
                0.5 * ((PI * along / radius).cos() + 1.0)
            } else {
                0.0
            };
            let radial = (PI * (rho_len - radius) / thickness).sin();
            let vort_phi = streamwise * radial * PI / thickness;
            let phi_hat = direction.cross(rho.normalize_or_zero());
            vorticity = phi_hat * (vort_phi * strength);
        }
        store.initialize(i, position, vorticity);
    });
    store.swap();
}
