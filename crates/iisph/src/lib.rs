//! Implicit incompressible SPH (IISPH) fluid solver.
//!
//! A CPU-side particle fluid simulation: density is estimated by kernel
//! summation over spatial-grid neighborhoods, non-pressure forces are
//! advected semi-implicitly, and incompressibility is enforced by a relaxed
//! Jacobi solve on an implicit pressure system before positions advance.
//! Particles are confined to an axis-aligned box.
//!
//! # Example
//!
//! ```
//! use iisph::{FluidSimulation, SimulationParams, UVec3, Vec3};
//!
//! let params = SimulationParams::for_spacing(0.05);
//! let positions = iisph::particle::sample_block(
//!     Vec3::new(0.1, 0.1, 0.1),
//!     UVec3::new(4, 4, 4),
//!     0.05,
//!     0.0,
//! );
//!
//! let mut sim = FluidSimulation::with_params(
//!     positions,
//!     Vec3::ZERO,
//!     Vec3::ONE,
//!     params,
//! )
//! .unwrap();
//!
//! for _ in 0..10 {
//!     sim.step(1.0 / 60.0);
//! }
//!
//! let (box_min, box_max) = sim.bounds();
//! assert!(sim.positions().iter().all(|p| p.z >= box_min.z && p.z <= box_max.z));
//! ```

pub mod constants;
pub mod grid;
pub mod iisph;
pub mod kernels;
pub mod params;
pub mod particle;
pub mod sph;

pub use glam::{UVec3, Vec3};
pub use iisph::IisphSolver;
pub use params::{ParamsError, SimulationParams};
pub use particle::ParticleSystem;
pub use sph::{SphSolver, StepStats};

/// Where the simulation is in its step cycle. `step` runs to completion
/// synchronously, so `Stepping` is only observable from within a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverPhase {
    Ready,
    Stepping,
}

/// A self-contained fluid simulation: particle arrays, domain box, and one
/// pressure solver. Instances share nothing and may run concurrently.
pub struct FluidSimulation {
    system: ParticleSystem,
    solver: IisphSolver,
    params: SimulationParams,
    phase: SolverPhase,
    stats: StepStats,
}

impl FluidSimulation {
    /// Create a simulation from an initial point cloud with default
    /// parameters. Velocities and pressures start at zero.
    pub fn new(positions: Vec<Vec3>, box_min: Vec3, box_max: Vec3) -> Self {
        Self::build(positions, box_min, box_max, SimulationParams::default())
    }

    /// Create a simulation with explicit parameters, rejecting invalid
    /// configuration up front.
    pub fn with_params(
        positions: Vec<Vec3>,
        box_min: Vec3,
        box_max: Vec3,
        params: SimulationParams,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self::build(positions, box_min, box_max, params))
    }

    fn build(
        positions: Vec<Vec3>,
        box_min: Vec3,
        box_max: Vec3,
        params: SimulationParams,
    ) -> Self {
        let n = positions.len();
        Self {
            system: ParticleSystem::new(
                positions,
                box_min,
                box_max,
                params.smoothing_radius,
                params.particle_mass,
            ),
            solver: IisphSolver::new(n),
            params,
            phase: SolverPhase::Ready,
            stats: StepStats::default(),
        }
    }

    /// Advance the simulation by `dt` seconds. Non-positive or non-finite
    /// `dt` leaves the state untouched.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= f32::EPSILON {
            return;
        }
        self.phase = SolverPhase::Stepping;
        self.stats = self.solver.step(&mut self.system, &self.params, dt);
        self.phase = SolverPhase::Ready;
    }

    /// Restore the initial configuration and drop all carried solver state.
    pub fn reset(&mut self) {
        self.system.reset();
        self.solver.reset();
        self.stats = StepStats::default();
        self.phase = SolverPhase::Ready;
    }

    /// Set the pressure solve iteration cap. The running configuration is
    /// unchanged on rejection.
    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<(), ParamsError> {
        let mut updated = self.params;
        updated.max_iterations = max_iterations;
        updated.validate()?;
        self.params = updated;
        Ok(())
    }

    /// Set the Jacobi relaxation factor, in (0, 1].
    pub fn set_relaxation(&mut self, relaxation: f32) -> Result<(), ParamsError> {
        let mut updated = self.params;
        updated.relaxation = relaxation;
        updated.validate()?;
        self.params = updated;
        Ok(())
    }

    /// Set the warm-start factor, in [0, 1].
    pub fn set_warm_start_factor(&mut self, factor: f32) -> Result<(), ParamsError> {
        let mut updated = self.params;
        updated.warm_start_factor = factor;
        updated.validate()?;
        self.params = updated;
        Ok(())
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    /// Diagnostics from the most recent step.
    pub fn last_step_stats(&self) -> StepStats {
        self.stats
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.system.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.system.velocities
    }

    pub fn densities(&self) -> &[f32] {
        &self.system.densities
    }

    pub fn pressures(&self) -> &[f32] {
        &self.system.pressures
    }

    pub fn particle_count(&self) -> usize {
        self.system.len()
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.system.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::sample_block;

    fn block_sim() -> FluidSimulation {
        let positions = sample_block(Vec3::splat(0.2), UVec3::splat(3), 0.05, 0.0);
        FluidSimulation::new(positions, Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn test_construction() {
        let sim = block_sim();
        assert_eq!(sim.particle_count(), 27);
        assert_eq!(sim.phase(), SolverPhase::Ready);
        assert!(sim.velocities().iter().all(|v| *v == Vec3::ZERO));
    }

    #[test]
    fn test_step_and_reset_round_trip() {
        let mut sim = block_sim();
        let initial = sim.positions().to_vec();

        for _ in 0..5 {
            sim.step(0.005);
        }
        assert_ne!(sim.positions(), initial.as_slice(), "gravity moved nothing");

        sim.reset();
        assert_eq!(sim.positions(), initial.as_slice());
        assert!(sim.velocities().iter().all(|v| *v == Vec3::ZERO));
        assert!(sim.pressures().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_invalid_configuration_is_rejected_and_state_kept() {
        let mut sim = block_sim();
        let before = *sim.params();

        assert!(sim.set_max_iterations(0).is_err());
        assert!(sim.set_relaxation(0.0).is_err());
        assert!(sim.set_relaxation(2.0).is_err());
        assert_eq!(sim.params().max_iterations, before.max_iterations);
        assert_eq!(sim.params().relaxation, before.relaxation);

        assert!(sim.set_max_iterations(20).is_ok());
        assert!(sim.set_relaxation(0.5).is_ok());
        assert_eq!(sim.params().max_iterations, 20);
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let mut params = SimulationParams::default();
        params.relaxation = -1.0;
        let result = FluidSimulation::with_params(Vec::new(), Vec3::ZERO, Vec3::ONE, params);
        assert!(matches!(result, Err(ParamsError::InvalidRelaxation(_))));
    }

    #[test]
    fn test_negative_dt_is_ignored() {
        let mut sim = block_sim();
        let initial = sim.positions().to_vec();
        sim.step(-0.01);
        sim.step(f32::NAN);
        sim.step(0.0);
        assert_eq!(sim.positions(), initial.as_slice());
    }

    #[test]
    fn test_empty_simulation_steps() {
        let mut sim = FluidSimulation::new(Vec::new(), Vec3::ZERO, Vec3::ONE);
        sim.step(0.01);
        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.last_step_stats().pressure_iterations, 0);
    }
}
