//! Shared SPH stages and the solver strategy seam.
//!
//! The stages here are common to any SPH pressure scheme: kernel density
//! summation, external (non-pressure) force accumulation, and the advection
//! of those forces into velocity. A concrete solver such as
//! [`IisphSolver`](crate::iisph::IisphSolver) supplies the pressure model
//! on top through [`SphSolver`].

use glam::Vec3;
use rayon::prelude::*;

use crate::constants::DENSITY_FLOOR;
use crate::kernels::SmoothingKernel;
use crate::params::SimulationParams;
use crate::particle::ParticleSystem;

/// Diagnostics from one completed step.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    /// Pressure solve iterations actually run (never above `max_iterations`).
    pub pressure_iterations: usize,
    /// Mean absolute density error at the end of the solve.
    pub density_error: f32,
    /// Particles whose density estimate had to be clamped to the floor.
    pub clamped_densities: usize,
}

/// One pressure scheme per simulation instance. Exactly one implementor
/// drives each [`FluidSimulation`](crate::FluidSimulation).
pub trait SphSolver {
    /// Run one full step against the shared particle arrays. Runs to
    /// completion synchronously.
    fn step(&mut self, system: &mut ParticleSystem, params: &SimulationParams, dt: f32)
        -> StepStats;

    /// Drop all state carried across steps (warm starts, buffers).
    fn reset(&mut self);
}

/// Kernel density summation over current neighbor lists, including the
/// self-contribution W(0). Non-finite or negative sums are clamped to the
/// density floor; the number of clamped particles is returned so the caller
/// can surface the event.
pub fn compute_densities(system: &mut ParticleSystem, kernel: &SmoothingKernel) -> usize {
    let ParticleSystem {
        positions,
        masses,
        neighbors,
        densities,
        ..
    } = system;
    let (positions, masses, neighbors) = (&*positions, &*masses, &*neighbors);

    densities
        .par_iter_mut()
        .enumerate()
        .map(|(i, rho)| {
            let mut sum = masses[i] * kernel.w0();
            for &j in &neighbors[i] {
                sum += masses[j] * kernel.w(positions[i].distance_squared(positions[j]));
            }
            if sum.is_finite() && sum >= DENSITY_FLOOR {
                *rho = sum;
                0usize
            } else {
                *rho = DENSITY_FLOOR;
                1
            }
        })
        .sum()
}

/// Accumulate gravity and kernel-weighted viscosity diffusion into the
/// non-pressure acceleration buffer. Densities must be current.
pub fn compute_external_forces(
    system: &mut ParticleSystem,
    params: &SimulationParams,
    kernel: &SmoothingKernel,
) {
    let ParticleSystem {
        positions,
        velocities,
        masses,
        densities,
        neighbors,
        accelerations,
        ..
    } = system;
    let (positions, velocities, masses, densities, neighbors) =
        (&*positions, &*velocities, &*masses, &*densities, &*neighbors);

    let gravity = params.gravity;
    let viscosity = params.viscosity;

    accelerations.par_iter_mut().enumerate().for_each(|(i, acc)| {
        let mut a = gravity;
        if viscosity > 0.0 {
            let mut diffusion = Vec3::ZERO;
            for &j in &neighbors[i] {
                let r = positions[i].distance(positions[j]);
                let weight = masses[j] / densities[j] * kernel.viscosity_laplacian(r);
                diffusion += (velocities[j] - velocities[i]) * weight;
            }
            a += viscosity * diffusion;
        }
        *acc = a;
    });
}

/// Semi-implicit Euler: fold the accumulated non-pressure accelerations into
/// velocity. Positions are integrated later, after pressure correction.
pub fn advect_velocities(system: &mut ParticleSystem, dt: f32) {
    let ParticleSystem {
        velocities,
        accelerations,
        ..
    } = system;
    let accelerations = &*accelerations;

    velocities
        .par_iter_mut()
        .zip(accelerations.par_iter())
        .for_each(|(vel, acc)| *vel += *acc * dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::sample_block;
    use glam::UVec3;

    fn rest_cube() -> (ParticleSystem, SimulationParams) {
        let params = SimulationParams::for_spacing(0.05);
        let positions = sample_block(Vec3::splat(0.4), UVec3::splat(2), 0.05, 0.0);
        let system = ParticleSystem::new(
            positions,
            Vec3::ZERO,
            Vec3::ONE,
            params.smoothing_radius,
            params.particle_mass,
        );
        (system, params)
    }

    #[test]
    fn test_density_includes_self_contribution() {
        let (mut system, params) = rest_cube();
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        system.build_neighbors();

        let clamped = compute_densities(&mut system, &kernel);
        assert_eq!(clamped, 0);

        let isolated_floor = params.particle_mass * kernel.w0();
        for &rho in &system.densities {
            assert!(rho >= isolated_floor, "density below self term: {}", rho);
            assert!(rho.is_finite());
        }
    }

    #[test]
    fn test_uniform_velocity_leaves_only_gravity() {
        let (mut system, mut params) = rest_cube();
        params.viscosity = 0.5;
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        system.build_neighbors();
        compute_densities(&mut system, &kernel);

        // Identical velocities: the viscosity diffusion term cancels and
        // only gravity remains.
        system.velocities.fill(Vec3::new(1.0, 0.0, 0.0));
        compute_external_forces(&mut system, &params, &kernel);

        for &acc in &system.accelerations {
            assert!((acc - params.gravity).length() < 1e-4, "acc = {:?}", acc);
        }
    }

    #[test]
    fn test_viscosity_pulls_toward_neighbor_velocity() {
        let (mut system, mut params) = rest_cube();
        params.viscosity = 0.5;
        params.gravity = Vec3::ZERO;
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        system.build_neighbors();
        compute_densities(&mut system, &kernel);

        // One particle moving through a resting neighborhood gets dragged
        // back; the rest get dragged along.
        system.velocities[0] = Vec3::new(2.0, 0.0, 0.0);
        compute_external_forces(&mut system, &params, &kernel);

        assert!(system.accelerations[0].x < 0.0);
        assert!(system.accelerations[1].x > 0.0);
    }

    #[test]
    fn test_advect_applies_acceleration() {
        let (mut system, _params) = rest_cube();
        system.accelerations.fill(Vec3::new(0.0, 0.0, -10.0));
        advect_velocities(&mut system, 0.1);

        for &vel in &system.velocities {
            assert!((vel.z + 1.0).abs() < 1e-6);
        }
    }
}
