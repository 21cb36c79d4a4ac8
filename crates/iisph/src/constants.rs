//! Physical constants and numerical floors for the solver.

use glam::Vec3;

/// Gravity acceleration (m/s^2) - negative Z direction (Z-up domain).
pub const GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);

/// Rest density of water (kg/m^3).
pub const WATER_REST_DENSITY: f32 = 1000.0;

/// Smallest density the solver will report. Non-finite or negative kernel
/// sums are clamped here instead of propagating through the pressure solve.
pub const DENSITY_FLOOR: f32 = 1.0e-4;

/// Below this magnitude the diagonal coefficient of the pressure system is
/// treated as zero and the particle is considered isolated: its pressure is
/// forced to zero rather than divided by a vanishing denominator.
pub const AII_EPSILON: f32 = 1.0e-6;
