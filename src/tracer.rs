//! Passive flow tracers with a drag/inertia model.
//!
//! Tracers sample the vorton-induced velocity field without feeding back
//! into it. Each tracer carries its own inertial velocity: quadratic drag
//! against the relative fluid velocity integrates into the inertia, and the
//! position integrates a Reynolds-ratio blend of inertial and field
//! velocity. A renderer can point a stream-mode vertex buffer at a
//! caller-owned tracer list and redraw it after `advect_tracers`.

use glam::Vec3;

use crate::constants::DT;
use crate::kernel;
use crate::vorton::Vorton;

/// A passive tracer point advected by the field velocity.
#[derive(Clone, Copy, Debug)]
pub struct FluidTracer {
    /// World position, updated in place by tracer advection.
    pub position: Vec3,
    /// The tracer's own inertial velocity.
    pub inertia: Vec3,
    /// Drag coefficient against relative fluid velocity.
    pub drag: f32,
    /// Effective particle radius used for the drag cross-section.
    pub radius: f32,
    /// Blend between inertial motion (0) and pure field advection (1).
    pub reynolds_ratio: f32,
    /// Accumulated simulated age in seconds.
    pub age: f32,
}

impl FluidTracer {
    /// A tracer at `position` with the default drag profile.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            inertia: Vec3::ZERO,
            drag: 1.0,
            radius: 0.01,
            reynolds_ratio: 0.8,
            age: 0.0,
        }
    }
}

/// Advance one tracer against the given influences.
///
/// The timestep is `min(DT, tpf)`: tracer advection is decoupled from the
/// fixed-step tick and driven by caller frame time, but never integrates
/// further than one fixed step at a time.
pub(crate) fn advect_tracer(tracer: &mut FluidTracer, influences: &[Vorton], tpf: f32) {
    let field_velocity = kernel::velocity_at(tracer.position, influences);
    move_tracer(tracer, field_velocity, tpf);
}

/// Integrate the drag/inertia model for one step.
pub(crate) fn move_tracer(tracer: &mut FluidTracer, fluid_velocity: Vec3, tpf: f32) {
    let step = DT.min(tpf);

    let relative = tracer.inertia - fluid_velocity;
    let sq_len = relative.length_squared();
    let force = 0.5 * sq_len * tracer.drag * (std::f32::consts::PI * tracer.radius * tracer.radius);
    let drag_force = -relative.normalize_or_zero() * force;
    tracer.inertia += drag_force * step;

    let blended = tracer.inertia.lerp(fluid_velocity, tracer.reynolds_ratio);
    tracer.position += blended * step;

    tracer.age += step;
}
