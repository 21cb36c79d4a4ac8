//! 3D SPH smoothing kernels.
//!
//! Density estimation uses the poly6 kernel, gradients use the spiky kernel
//! (its gradient does not vanish at r = 0 neighborhoods, which keeps pressure
//! forces repulsive under clustering), and viscosity uses the Laplacian of
//! the viscosity kernel. Coefficients are precomputed once per support
//! radius so the hot loops avoid `powi` entirely.

use glam::Vec3;
use std::f32::consts::PI;

/// Precomputed kernel evaluations for one support radius `h`.
#[derive(Clone, Copy, Debug)]
pub struct SmoothingKernel {
    h: f32,
    h2: f32,
    w_zero: f32,
    poly6_coeff: f32, // 315 / (64 pi h^9)
    spiky_coeff: f32, // -45 / (pi h^6)
    visc_coeff: f32,  // 45 / (pi h^6)
}

impl SmoothingKernel {
    pub fn new(h: f32) -> Self {
        let h2 = h * h;
        let poly6_coeff = 315.0 / (64.0 * PI * h.powi(9));
        Self {
            h,
            h2,
            w_zero: poly6_coeff * h2 * h2 * h2,
            poly6_coeff,
            spiky_coeff: -45.0 / (PI * h.powi(6)),
            visc_coeff: 45.0 / (PI * h.powi(6)),
        }
    }

    /// Support radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.h
    }

    /// Poly6 weight from a squared distance.
    #[inline]
    pub fn w(&self, r2: f32) -> f32 {
        if r2 >= self.h2 {
            return 0.0;
        }
        let term = self.h2 - r2;
        self.poly6_coeff * term * term * term
    }

    /// Self-contribution W(0).
    #[inline]
    pub fn w0(&self) -> f32 {
        self.w_zero
    }

    /// Spiky kernel gradient. `r_vec` points from the neighbor to the
    /// evaluation point. Zero outside the support and at coincident points.
    #[inline]
    pub fn gradient(&self, r_vec: Vec3) -> Vec3 {
        let r = r_vec.length();
        if r >= self.h || r <= 1e-5 {
            return Vec3::ZERO;
        }
        let term = self.h - r;
        r_vec * (self.spiky_coeff * term * term / r)
    }

    /// Laplacian of the viscosity kernel.
    #[inline]
    pub fn viscosity_laplacian(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        self.visc_coeff * (self.h - r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly6_maximum_at_zero() {
        let k = SmoothingKernel::new(0.1);
        assert!(k.w0() > 0.0);
        assert!((k.w(0.0) - k.w0()).abs() < 1e-3 * k.w0());
    }

    #[test]
    fn test_poly6_vanishes_at_support() {
        let k = SmoothingKernel::new(0.1);
        assert_eq!(k.w(0.01), 0.0);
        assert_eq!(k.w(0.02), 0.0);
    }

    #[test]
    fn test_poly6_decreases_with_distance() {
        let k = SmoothingKernel::new(1.0);
        let w_near = k.w(0.25);
        let w_far = k.w(0.81);
        assert!(w_near < k.w0());
        assert!(w_far < w_near, "w(0.9h) = {} >= w(0.5h) = {}", w_far, w_near);
    }

    #[test]
    fn test_gradient_points_outward() {
        let k = SmoothingKernel::new(1.0);
        // r_vec from neighbor to sample point: gradient pushes them apart,
        // so it is anti-parallel to r_vec for the spiky kernel.
        let grad = k.gradient(Vec3::new(0.5, 0.0, 0.0));
        assert!(grad.x < 0.0, "expected negative x gradient, got {}", grad.x);
        assert_eq!(grad.y, 0.0);
        assert_eq!(grad.z, 0.0);
    }

    #[test]
    fn test_gradient_zero_at_origin_and_beyond_support() {
        let k = SmoothingKernel::new(1.0);
        assert_eq!(k.gradient(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(k.gradient(Vec3::new(1.5, 0.0, 0.0)), Vec3::ZERO);
    }

    #[test]
    fn test_gradient_antisymmetric() {
        let k = SmoothingKernel::new(1.0);
        let r = Vec3::new(0.3, -0.2, 0.4);
        let sum = k.gradient(r) + k.gradient(-r);
        assert!(sum.length() < 1e-5, "gradient not antisymmetric: {:?}", sum);
    }

    #[test]
    fn test_viscosity_laplacian_positive_inside_support() {
        let k = SmoothingKernel::new(1.0);
        assert!(k.viscosity_laplacian(0.5) > 0.0);
        assert_eq!(k.viscosity_laplacian(1.0), 0.0);
    }

    #[test]
    fn test_poly6_integrates_to_one() {
        // Coarse radial quadrature of 4 pi r^2 W(r) over [0, h].
        let k = SmoothingKernel::new(0.2);
        let steps = 2000;
        let dr = 0.2 / steps as f32;
        let mut integral = 0.0;
        for s in 0..steps {
            let r = (s as f32 + 0.5) * dr;
            integral += 4.0 * PI * r * r * k.w(r * r) * dr;
        }
        assert!(
            (integral - 1.0).abs() < 0.01,
            "poly6 normalization off: integral = {}",
            integral
        );
    }
}
