//! Vortex ring demo: inject a ring, run the fixed-step pipeline, and print
//! how the vorton cloud drifts along the ring axis.
//!
//! Run with `RUST_LOG=debug` to see per-stage timings.

use glam::Vec3;
use vorton_sim::{FluidTracer, VortonSim, DT};

fn main() {
    env_logger::init();

    let mut sim = VortonSim::new(512, 0.5, 5);
    sim.initialize_threads(4);
    sim.distribute_vortons(Vec3::splat(-1.0), Vec3::splat(1.0));
    sim.inject_vortex_ring(0.8, 0.4, 4.0, Vec3::Y, Vec3::ZERO);

    let mut tracers: Vec<FluidTracer> = (0..64)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / 64.0;
            FluidTracer::new(Vec3::new(0.8 * angle.cos(), 0.0, 0.8 * angle.sin()))
        })
        .collect();

    let mut positions = vec![Vec3::ZERO; sim.vorton_count()];
    for frame in 0..300 {
        sim.step_simulation(DT * 1.5);
        sim.advect_tracers(&mut tracers, DT);

        if frame % 60 == 0 {
            sim.trace_vortons(&mut positions);
            let mean_y: f32 =
                positions.iter().map(|p| p.y).sum::<f32>() / positions.len() as f32;
            let tracer_mean_y: f32 =
                tracers.iter().map(|t| t.position.y).sum::<f32>() / tracers.len() as f32;
            println!(
                "frame {:3}: vorton mean y = {:+.4}, tracer mean y = {:+.4}",
                frame, mean_y, tracer_mean_y
            );
        }
    }

    sim.stop_threads();
}
