//! Regularized Biot-Savart velocity kernel and its numerical Jacobian.

use glam::{Mat3, Vec3};

use crate::constants::{
    AVOID_SINGULARITY, FOUR_THIRDS_PI, JACOBIAN_D, ONE_OVER_4_PI, VORTON_RADIUS_CUBE,
    VORTON_RADIUS_SQ,
};
use crate::vorton::Vorton;

/// Field velocity at `point` induced by the given influences, scaled by
/// the 1/(4pi) Biot-Savart normalization.
pub fn velocity_at(point: Vec3, influences: &[Vorton]) -> Vec3 {
    let mut accum = Vec3::ZERO;
    for v in influences {
        accumulate_contribution(point, v, &mut accum);
    }
    accum * ONE_OVER_4_PI
}

/// Add one vorton's contribution to the velocity accumulator.
///
/// Inside the core radius the falloff is clamped to `1/(d * r_core^2)` so
/// the field stays bounded at coincident points; outside it decays as
/// `1/(d * d^2)`. Non-finite vortons are skipped silently: they come from
/// uninitialized or transient state and must not corrupt the accumulator.
fn accumulate_contribution(point: Vec3, v: &Vorton, accum: &mut Vec3) {
    if !v.is_finite() {
        return;
    }
    let r = point - v.position;
    let dist2 = r.length_squared() + AVOID_SINGULARITY;
    let one_over_dist = 1.0 / dist2.sqrt();
    let falloff = if dist2 < VORTON_RADIUS_SQ {
        one_over_dist / VORTON_RADIUS_SQ
    } else {
        one_over_dist / dist2
    };
    *accum += (v.vorticity * (FOUR_THIRDS_PI * VORTON_RADIUS_CUBE)).cross(r) * falloff;
}

/// Numerical Jacobian of the velocity field at `point`.
///
/// Evaluates the field at six points offset by +/- `JACOBIAN_D` along each
/// axis and forms each column as a central difference. Six full field
/// evaluations per call makes this the most expensive part of the
/// stretch/tilt stage.
pub fn jacobian_at(point: Vec3, influences: &[Vorton]) -> Mat3 {
    let two_d = 2.0 * JACOBIAN_D;
    let dx = (velocity_at(point + Vec3::X * JACOBIAN_D, influences)
        - velocity_at(point - Vec3::X * JACOBIAN_D, influences))
        / two_d;
    let dy = (velocity_at(point + Vec3::Y * JACOBIAN_D, influences)
        - velocity_at(point - Vec3::Y * JACOBIAN_D, influences))
        / two_d;
    let dz = (velocity_at(point + Vec3::Z * JACOBIAN_D, influences)
        - velocity_at(point - Vec3::Z * JACOBIAN_D, influences))
        / two_d;
    Mat3::from_cols(dx, dy, dz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VORTON_RADIUS;

    fn unit_vorton() -> Vorton {
        Vorton::new(Vec3::ZERO, Vec3::Z)
    }

    #[test]
    fn test_no_influences_is_zero() {
        assert_eq!(velocity_at(Vec3::ONE, &[]), Vec3::ZERO);
    }

    #[test]
    fn test_far_field_decays_monotonically() {
        let v = [unit_vorton()];
        let mut last = f32::INFINITY;
        // Strictly decreasing magnitude beyond the core radius.
        for i in 1..20 {
            let d = VORTON_RADIUS * 2.0 + i as f32 * 0.5;
            let speed = velocity_at(Vec3::new(d, 0.0, 0.0), &v).length();
            assert!(
                speed < last,
                "speed should decay with distance: {} !< {} at d={}",
                speed,
                last,
                d
            );
            last = speed;
        }
    }

    #[test]
    fn test_bounded_at_vorton_center() {
        let v = [unit_vorton()];
        let at_center = velocity_at(Vec3::ZERO, &v);
        let near = velocity_at(Vec3::new(1e-4, 0.0, 0.0), &v);
        assert!(at_center.is_finite());
        assert!(near.is_finite());
        // The regularized core keeps speeds modest even right on top.
        assert!(near.length() < 1.0, "core speed blew up: {}", near.length());
    }

    #[test]
    fn test_contribution_perpendicular_to_offset_and_vorticity() {
        let v = [unit_vorton()];
        let vel = velocity_at(Vec3::new(1.0, 0.0, 0.0), &v);
        // r = point - vorton = +X, vorticity = +Z, and Z x X = Y.
        assert!(vel.x.abs() < 1e-7);
        assert!(vel.z.abs() < 1e-7);
        assert!(vel.y > 0.0);
    }

    #[test]
    fn test_non_finite_vorton_skipped() {
        let bad = Vorton::new(Vec3::splat(f32::NAN), Vec3::ONE);
        let good = unit_vorton();
        let with_bad = velocity_at(Vec3::ONE, &[bad, good]);
        let without = velocity_at(Vec3::ONE, &[good]);
        assert!(with_bad.is_finite());
        assert_eq!(with_bad, without);
    }

    #[test]
    fn test_jacobian_trace_vanishes_for_swirl_field() {
        // The far field of a single vorton is divergence-free, so the
        // velocity-gradient trace should vanish up to finite-difference noise.
        let v = [unit_vorton()];
        let j = jacobian_at(Vec3::new(1.3, 0.7, -0.4), &v);
        let trace = j.col(0).x + j.col(1).y + j.col(2).z;
        assert!(trace.abs() < 1e-5, "divergence leaked into Jacobian: {}", trace);
    }

    #[test]
    fn test_jacobian_shear_matches_analytic_far_field() {
        // v = C (Z x r) / |r|^3 away from the core, so at (2, 0, 0):
        // dvy/dx = C (1/r^3 - 3 x^2 / r^5) = -C / 4.
        let v = [unit_vorton()];
        let c = ONE_OVER_4_PI * FOUR_THIRDS_PI * VORTON_RADIUS_CUBE;
        let expected = -c / 4.0;
        let j = jacobian_at(Vec3::new(2.0, 0.0, 0.0), &v);
        let dvy_dx = j.col(0).y;
        let err = (dvy_dx - expected).abs();
        assert!(
            err < expected.abs() * 0.05,
            "dvy/dx = {}, expected about {}",
            dvy_dx,
            expected
        );
    }

    #[test]
    fn test_jacobian_of_empty_field_is_zero() {
        let j = jacobian_at(Vec3::ONE, &[]);
        assert_eq!(j, Mat3::ZERO);
    }
}
