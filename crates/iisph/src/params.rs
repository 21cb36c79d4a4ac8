//! Solver configuration.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{GRAVITY, WATER_REST_DENSITY};

/// Configuration misuse. Rejected when set; never raised by the numerical
/// core itself.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("max_iterations must be positive")]
    InvalidMaxIterations,
    #[error("relaxation must be in (0, 1], got {0}")]
    InvalidRelaxation(f32),
    #[error("warm_start_factor must be in [0, 1], got {0}")]
    InvalidWarmStartFactor(f32),
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("viscosity must be non-negative and finite, got {0}")]
    InvalidViscosity(f32),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Target rest density (kg/m^3).
    pub rest_density: f32,
    /// Uniform particle mass (kg). See [`SimulationParams::for_spacing`].
    pub particle_mass: f32,
    /// Kernel support radius h (m).
    pub smoothing_radius: f32,
    pub gravity: Vec3,
    /// Kinematic viscosity coefficient for the diffusion term.
    pub viscosity: f32,
    /// Cap on pressure solve iterations per step.
    pub max_iterations: usize,
    /// Jacobi relaxation factor (omega).
    pub relaxation: f32,
    /// Fraction of the previous step's pressure used to seed the solve.
    /// Zero disables warm starting.
    pub warm_start_factor: f32,
    /// Convergence target for the mean density error, as a fraction of the
    /// rest density.
    pub tolerance: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::for_spacing(0.05)
    }
}

impl SimulationParams {
    /// Parameters for a fluid sampled at the given particle spacing: the
    /// support radius spans two spacings and the mass matches the rest
    /// density over one particle's volume.
    pub fn for_spacing(spacing: f32) -> Self {
        Self {
            rest_density: WATER_REST_DENSITY,
            particle_mass: WATER_REST_DENSITY * spacing * spacing * spacing,
            smoothing_radius: 2.0 * spacing,
            gravity: GRAVITY,
            viscosity: 0.01,
            max_iterations: 100,
            relaxation: 0.3,
            warm_start_factor: 0.5,
            tolerance: 0.01,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        fn positive(name: &'static str, value: f32) -> Result<(), ParamsError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ParamsError::NonPositive { name, value })
            }
        }

        positive("rest_density", self.rest_density)?;
        positive("particle_mass", self.particle_mass)?;
        positive("smoothing_radius", self.smoothing_radius)?;
        positive("tolerance", self.tolerance)?;
        if self.max_iterations == 0 {
            return Err(ParamsError::InvalidMaxIterations);
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(ParamsError::InvalidRelaxation(self.relaxation));
        }
        if !(self.warm_start_factor >= 0.0 && self.warm_start_factor <= 1.0) {
            return Err(ParamsError::InvalidWarmStartFactor(self.warm_start_factor));
        }
        if !(self.viscosity >= 0.0 && self.viscosity.is_finite()) {
            return Err(ParamsError::InvalidViscosity(self.viscosity));
        }
        Ok(())
    }
}
