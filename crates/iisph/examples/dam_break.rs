//! Dam-break diagnostic: a block of fluid released in the corner of a long
//! box. Prints solver iteration counts and density error so convergence
//! behavior can be eyeballed per frame.
//!
//! Run with: cargo run --release --example dam_break

use glam::{UVec3, Vec3};
use iisph::particle::sample_block;
use iisph::{FluidSimulation, SimulationParams};

fn main() {
    env_logger::init();

    let spacing = 0.025;
    let params = SimulationParams::for_spacing(spacing);
    let positions = sample_block(
        Vec3::new(0.05, 0.05, 0.05),
        UVec3::new(8, 8, 12),
        spacing,
        0.1 * spacing,
    );

    let mut sim = FluidSimulation::with_params(
        positions,
        Vec3::ZERO,
        Vec3::new(1.0, 0.3, 0.4),
        params,
    )
    .expect("valid parameters");

    println!("dam break: {} particles", sim.particle_count());

    let dt = 1.0 / 120.0;
    for frame in 0..240 {
        sim.step(dt);

        if frame % 20 == 0 {
            let stats = sim.last_step_stats();
            let max_vel = sim
                .velocities()
                .iter()
                .map(|v| v.length())
                .fold(0.0f32, f32::max);
            let mean_height = sim.positions().iter().map(|p| p.z).sum::<f32>()
                / sim.particle_count() as f32;
            println!(
                "frame {:4}: {:3} iters, density err {:9.4}, max vel {:6.3}, mean z {:.3}",
                frame, stats.pressure_iterations, stats.density_error, max_vel, mean_height
            );
        }
    }
}
