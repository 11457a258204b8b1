//! Physical and numerical constants for the vorton simulation.

use std::f32::consts::PI;

/// Finite core radius of a vorton. The velocity kernel is regularized
/// inside this radius to keep the field bounded near a vorton center.
pub const VORTON_RADIUS: f32 = 0.1;
/// Core radius squared.
pub const VORTON_RADIUS_SQ: f32 = VORTON_RADIUS * VORTON_RADIUS;
/// Core radius cubed.
pub const VORTON_RADIUS_CUBE: f32 = VORTON_RADIUS * VORTON_RADIUS * VORTON_RADIUS;

/// Epsilon added to squared distances so coincident points never divide by zero.
pub const AVOID_SINGULARITY: f32 = 0.000_01;

/// 1 / 4pi, the Biot-Savart normalization.
pub const ONE_OVER_4_PI: f32 = 1.0 / (4.0 * PI);
/// (4/3) pi, the sphere-volume factor applied to vorticity.
pub const FOUR_THIRDS_PI: f32 = (4.0 / 3.0) * PI;

/// Finite-difference offset for the numerical velocity Jacobian.
pub const JACOBIAN_D: f32 = 0.001;

/// Fixed simulation timestep. `step_simulation` accumulates caller time
/// and advances the physics in whole multiples of this.
pub const DT: f32 = 1.0 / 60.0;

/// Barnes-Hut style opening threshold: a subtree whose extent-to-distance
/// ratio is below this is summarized by its aggregate vorton.
pub const OPENING_RATIO: f32 = 0.6;
