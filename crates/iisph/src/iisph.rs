//! Implicit incompressible SPH pressure projection.
//!
//! Instead of a stiff equation of state, pressure is obtained by iterating a
//! relaxed Jacobi solve on a discretized pressure Poisson system whose source
//! term is the predicted density deviation. Every per-particle pass reads
//! only previous-iteration values and writes a separate buffer, so the
//! iteration stays order-independent and safe to parallelize.

use glam::Vec3;
use rayon::prelude::*;
use std::mem;

use crate::constants::AII_EPSILON;
use crate::kernels::SmoothingKernel;
use crate::params::SimulationParams;
use crate::particle::ParticleSystem;
use crate::sph::{self, SphSolver, StepStats};

pub struct IisphSolver {
    /// Density estimate after non-pressure advection, before correction.
    predicted_densities: Vec<f32>,
    /// Diagonal coefficient of the pressure system per particle.
    aii: Vec<f32>,
    /// Pressure operator applied to the current pressure field (diagnostic).
    api: Vec<f32>,
    pressure_accels: Vec<Vec3>,
    /// Jacobi write buffer; swapped with the live pressures each iteration.
    next_pressures: Vec<f32>,
    /// Previous step's converged pressures, for warm starting.
    last_pressures: Vec<f32>,
}

impl IisphSolver {
    pub fn new(particle_count: usize) -> Self {
        Self {
            predicted_densities: vec![0.0; particle_count],
            aii: vec![0.0; particle_count],
            api: vec![0.0; particle_count],
            pressure_accels: vec![Vec3::ZERO; particle_count],
            next_pressures: vec![0.0; particle_count],
            last_pressures: vec![0.0; particle_count],
        }
    }

    /// Per-particle pressure operator values from the last Jacobi pass.
    /// Exposed for diagnostics.
    pub fn api(&self) -> &[f32] {
        &self.api
    }

    /// Predict densities after non-pressure advection, assemble the diagonal
    /// coefficients, and seed pressures from the previous step.
    ///
    /// Expects neighbor lists, densities, and advected velocities to be
    /// current.
    pub fn predict_advection(
        &mut self,
        system: &mut ParticleSystem,
        params: &SimulationParams,
        dt: f32,
    ) {
        self.sync_buffers(system.len());
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        let dt2 = dt * dt;
        let inv_rho0_sq = 1.0 / (params.rest_density * params.rest_density);

        {
            let ParticleSystem {
                positions,
                velocities,
                masses,
                densities,
                neighbors,
                ..
            } = &*system;

            self.predicted_densities
                .par_iter_mut()
                .zip(self.aii.par_iter_mut())
                .enumerate()
                .for_each(|(i, (rho_star, aii))| {
                    let mut divergence = 0.0;
                    let mut grad_sum = Vec3::ZERO;
                    let mut grad_sq_sum = 0.0;
                    for &j in &neighbors[i] {
                        let grad = kernel.gradient(positions[i] - positions[j]);
                        divergence += masses[j] * (velocities[i] - velocities[j]).dot(grad);
                        grad_sum += masses[j] * grad;
                        grad_sq_sum += masses[j] * grad.length_squared();
                    }
                    *rho_star = densities[i] + dt * divergence;
                    // Diagonal of the pressure operator: applying it to the
                    // unit pressure field of particle i yields exactly this.
                    *aii = -dt2
                        * inv_rho0_sq
                        * (grad_sum.length_squared() + masses[i] * grad_sq_sum);
                });
        }

        // Warm start from the previous step; isolated particles stay at zero.
        let warm = params.warm_start_factor;
        let last = &self.last_pressures;
        let aii = &self.aii;
        system
            .pressures
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                *p = if aii[i].abs() < AII_EPSILON {
                    0.0
                } else {
                    warm * last[i]
                };
            });
    }

    /// One relaxed Jacobi pass over the pressure field. Returns the mean
    /// absolute density error over particles that carry pressure; particles
    /// whose update clamps to zero (no suction) and isolated particles are
    /// excluded, so a configuration at or below rest density reads as
    /// converged.
    pub fn pressure_solve_iteration(
        &mut self,
        system: &mut ParticleSystem,
        params: &SimulationParams,
        dt: f32,
    ) -> f32 {
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        let rho0 = params.rest_density;
        let omega = params.relaxation;
        let dt2 = dt * dt;

        self.compute_pressure_accels(system, params, &kernel);

        let (error_sum, counted) = {
            let ParticleSystem {
                positions,
                masses,
                pressures,
                neighbors,
                ..
            } = &*system;
            let accels = &self.pressure_accels;
            let aii = &self.aii;
            let predicted = &self.predicted_densities;

            self.next_pressures
                .par_iter_mut()
                .zip(self.api.par_iter_mut())
                .enumerate()
                .map(|(i, (next_p, api))| {
                    if aii[i].abs() < AII_EPSILON {
                        *next_p = 0.0;
                        *api = 0.0;
                        return (0.0, 0usize);
                    }

                    // Divergence of the pressure accelerations, in density
                    // units: the full operator including the diagonal.
                    let mut divergence = 0.0;
                    for &j in &neighbors[i] {
                        let grad = kernel.gradient(positions[i] - positions[j]);
                        divergence += masses[j] * (accels[i] - accels[j]).dot(grad);
                    }
                    let ap = dt2 * divergence;
                    *api = ap;

                    let residual = rho0 - predicted[i] - ap;
                    let candidate = pressures[i] + omega * residual / aii[i];
                    if candidate > 0.0 {
                        *next_p = candidate;
                        (residual.abs(), 1)
                    } else {
                        *next_p = 0.0;
                        (0.0, 0)
                    }
                })
                .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
        };

        mem::swap(&mut system.pressures, &mut self.next_pressures);

        if counted == 0 {
            0.0
        } else {
            error_sum / counted as f32
        }
    }

    /// Outer driver: iterate the Jacobi solve until the mean density error
    /// drops under the tolerance or the iteration cap is reached. Running
    /// out of iterations is not an error; the best available field is used.
    pub fn compute_pressure(
        &mut self,
        system: &mut ParticleSystem,
        params: &SimulationParams,
        dt: f32,
    ) -> (usize, f32) {
        let target = params.tolerance * params.rest_density;
        let mut iterations = 0;
        let mut error = f32::INFINITY;

        while iterations < params.max_iterations {
            error = self.pressure_solve_iteration(system, params, dt);
            iterations += 1;
            if error <= target {
                break;
            }
        }

        if error > target {
            log::warn!(
                "pressure solve hit the iteration cap ({}) with mean density error {:.4}",
                params.max_iterations,
                error
            );
        }
        (iterations, error)
    }

    /// Symmetric SPH pressure gradient from the current pressure field.
    fn compute_pressure_accels(
        &mut self,
        system: &ParticleSystem,
        params: &SimulationParams,
        kernel: &SmoothingKernel,
    ) {
        let inv_rho0_sq = 1.0 / (params.rest_density * params.rest_density);
        let ParticleSystem {
            positions,
            masses,
            pressures,
            neighbors,
            ..
        } = system;

        self.pressure_accels
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, accel)| {
                let mut a = Vec3::ZERO;
                let p_i = pressures[i];
                for &j in &neighbors[i] {
                    let grad = kernel.gradient(positions[i] - positions[j]);
                    a -= masses[j] * (p_i + pressures[j]) * inv_rho0_sq * grad;
                }
                *accel = a;
            });
    }

    /// Fold the converged pressure forces into velocity, advance positions,
    /// and clamp to the domain box.
    fn apply_pressure_and_integrate(
        &mut self,
        system: &mut ParticleSystem,
        params: &SimulationParams,
        dt: f32,
    ) {
        let kernel = SmoothingKernel::new(params.smoothing_radius);
        self.compute_pressure_accels(system, params, &kernel);

        {
            let accels = &self.pressure_accels;
            let ParticleSystem {
                positions,
                velocities,
                ..
            } = system;

            positions
                .par_iter_mut()
                .zip(velocities.par_iter_mut())
                .enumerate()
                .for_each(|(i, (pos, vel))| {
                    *vel += accels[i] * dt;
                    *pos += *vel * dt;
                });
        }

        system.apply_boundaries();
    }

    fn sync_buffers(&mut self, n: usize) {
        self.predicted_densities.resize(n, 0.0);
        self.aii.resize(n, 0.0);
        self.api.resize(n, 0.0);
        self.pressure_accels.resize(n, Vec3::ZERO);
        self.next_pressures.resize(n, 0.0);
        self.last_pressures.resize(n, 0.0);
    }
}

impl SphSolver for IisphSolver {
    fn step(&mut self, system: &mut ParticleSystem, params: &SimulationParams, dt: f32) -> StepStats {
        let mut stats = StepStats::default();
        if system.is_empty() || !dt.is_finite() || dt <= f32::EPSILON {
            return stats;
        }

        let kernel = SmoothingKernel::new(params.smoothing_radius);

        system.build_neighbors();

        stats.clamped_densities = sph::compute_densities(system, &kernel);
        if stats.clamped_densities > 0 {
            log::warn!(
                "{} particles had non-finite or negative density; clamped to floor",
                stats.clamped_densities
            );
        }

        sph::compute_external_forces(system, params, &kernel);
        sph::advect_velocities(system, dt);

        self.predict_advection(system, params, dt);
        let (iterations, error) = self.compute_pressure(system, params, dt);
        stats.pressure_iterations = iterations;
        stats.density_error = error;

        self.apply_pressure_and_integrate(system, params, dt);

        self.sync_buffers(system.len());
        self.last_pressures.copy_from_slice(&system.pressures);

        log::debug!(
            "step complete: {} pressure iterations, mean density error {:.5}",
            iterations,
            error
        );
        stats
    }

    fn reset(&mut self) {
        self.predicted_densities.fill(0.0);
        self.aii.fill(0.0);
        self.api.fill(0.0);
        self.pressure_accels.fill(Vec3::ZERO);
        self.next_pressures.fill(0.0);
        self.last_pressures.fill(0.0);
    }
}
