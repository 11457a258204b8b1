//! Jet ring demo: an annulus of azimuthal vorticity driving a jet along +y.

use glam::Vec3;
use vorton_sim::{VortonSim, DT};

fn main() {
    env_logger::init();

    let mut sim = VortonSim::new(343, 0.8, 5);
    sim.initialize_threads(4);
    sim.distribute_vortons(Vec3::splat(-1.5), Vec3::splat(1.5));
    sim.inject_jet_ring(0.6, 0.5, 1.0, 2.0, Vec3::Y, Vec3::ZERO);

    let mut positions = vec![Vec3::ZERO; sim.vorton_count()];
    for frame in 0..600 {
        sim.step_simulation(DT * 1.5);

        if frame % 120 == 0 {
            sim.trace_vortons(&mut positions);
            let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
            for p in &positions {
                min_y = min_y.min(p.y);
                max_y = max_y.max(p.y);
            }
            println!("frame {:3}: vorton y span [{:+.3}, {:+.3}]", frame, min_y, max_y);
        }
    }

    sim.stop_threads();
}
