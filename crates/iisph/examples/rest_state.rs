//! Rest-state diagnostic: a cube sampled at rest-density spacing with no
//! external forces should not drift. Reports the maximum displacement and
//! pressure after a run, which should both stay near zero.
//!
//! Run with: cargo run --release --example rest_state

use glam::{UVec3, Vec3};
use iisph::particle::sample_block;
use iisph::{FluidSimulation, SimulationParams};

fn main() {
    env_logger::init();

    let spacing = 0.05;
    let mut params = SimulationParams::for_spacing(spacing);
    params.gravity = Vec3::ZERO;
    params.viscosity = 0.0;

    let positions = sample_block(Vec3::splat(0.4), UVec3::splat(4), spacing, 0.0);
    let initial = positions.clone();

    let mut sim = FluidSimulation::with_params(positions, Vec3::ZERO, Vec3::ONE, params)
        .expect("valid parameters");

    for _ in 0..120 {
        sim.step(1.0 / 120.0);
    }

    let max_drift = sim
        .positions()
        .iter()
        .zip(&initial)
        .map(|(p, s)| (*p - *s).length())
        .fold(0.0f32, f32::max);
    let max_pressure = sim.pressures().iter().cloned().fold(0.0f32, f32::max);
    let stats = sim.last_step_stats();

    println!("rest state after 120 frames:");
    println!("  max drift     {:.6}", max_drift);
    println!("  max pressure  {:.6}", max_pressure);
    println!(
        "  last step: {} iters, density err {:.6}",
        stats.pressure_iterations, stats.density_error
    );
}
