//! Per-particle state and boundary handling.
//!
//! All quantities live in parallel dense arrays indexed by a stable particle
//! id (structure of arrays). The initial positions are snapshotted at
//! construction so `reset` restores the exact starting configuration.

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use crate::grid::SpatialGrid;

pub struct ParticleSystem {
    pub positions: Vec<Vec3>,
    pub velocities: Vec<Vec3>,
    pub densities: Vec<f32>,
    pub masses: Vec<f32>,
    pub pressures: Vec<f32>,
    /// Non-pressure accelerations (gravity + viscosity).
    pub accelerations: Vec<Vec3>,
    /// Neighbor index lists, rebuilt every step from current positions.
    pub neighbors: Vec<Vec<usize>>,

    initial_positions: Vec<Vec3>,
    box_min: Vec3,
    box_max: Vec3,
    grid: SpatialGrid,
}

impl ParticleSystem {
    /// Build a system from an initial point cloud inside `[box_min, box_max]`.
    /// The grid cell size doubles as the neighbor support radius.
    pub fn new(
        positions: Vec<Vec3>,
        box_min: Vec3,
        box_max: Vec3,
        support_radius: f32,
        particle_mass: f32,
    ) -> Self {
        let n = positions.len();
        let grid = SpatialGrid::new(box_min, box_max, support_radius);
        Self {
            initial_positions: positions.clone(),
            positions,
            velocities: vec![Vec3::ZERO; n],
            densities: vec![0.0; n],
            masses: vec![particle_mass; n],
            pressures: vec![0.0; n],
            accelerations: vec![Vec3::ZERO; n],
            neighbors: vec![Vec::new(); n],
            box_min,
            box_max,
            grid,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.box_min, self.box_max)
    }

    /// Rebuild every particle's neighbor list from current positions.
    /// The grid build is a full barrier before the parallel queries.
    pub fn build_neighbors(&mut self) {
        self.grid.build(&self.positions);

        let grid = &self.grid;
        let positions = &self.positions;
        let radius = grid.cell_size();
        self.neighbors
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, list)| {
                grid.collect_neighbors(i, positions, radius, list);
            });
    }

    /// Clamp particle `i` into the box and zero its outward velocity
    /// component. No restitution.
    pub fn apply_boundary(&mut self, i: usize) {
        clamp_to_box(
            &mut self.positions[i],
            &mut self.velocities[i],
            self.box_min,
            self.box_max,
        );
    }

    /// Boundary pass over all particles.
    pub fn apply_boundaries(&mut self) {
        let (box_min, box_max) = (self.box_min, self.box_max);
        self.positions
            .par_iter_mut()
            .zip(self.velocities.par_iter_mut())
            .for_each(|(pos, vel)| clamp_to_box(pos, vel, box_min, box_max));
    }

    /// Restore the initial configuration: positions back to the snapshot,
    /// velocities, pressures and derived state zeroed.
    pub fn reset(&mut self) {
        self.positions.copy_from_slice(&self.initial_positions);
        self.velocities.fill(Vec3::ZERO);
        self.densities.fill(0.0);
        self.pressures.fill(0.0);
        self.accelerations.fill(Vec3::ZERO);
        for list in &mut self.neighbors {
            list.clear();
        }
    }
}

fn clamp_to_box(pos: &mut Vec3, vel: &mut Vec3, min: Vec3, max: Vec3) {
    if pos.x < min.x {
        pos.x = min.x;
        if vel.x < 0.0 {
            vel.x = 0.0;
        }
    } else if pos.x > max.x {
        pos.x = max.x;
        if vel.x > 0.0 {
            vel.x = 0.0;
        }
    }
    if pos.y < min.y {
        pos.y = min.y;
        if vel.y < 0.0 {
            vel.y = 0.0;
        }
    } else if pos.y > max.y {
        pos.y = max.y;
        if vel.y > 0.0 {
            vel.y = 0.0;
        }
    }
    if pos.z < min.z {
        pos.z = min.z;
        if vel.z < 0.0 {
            vel.z = 0.0;
        }
    } else if pos.z > max.z {
        pos.z = max.z;
        if vel.z > 0.0 {
            vel.z = 0.0;
        }
    }
}

/// Sample an axis-aligned block of particle positions: `counts` particles per
/// axis starting at `origin`, spaced by `spacing`, with optional jitter.
pub fn sample_block(origin: Vec3, counts: UVec3, spacing: f32, jitter: f32) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity((counts.x * counts.y * counts.z) as usize);
    for k in 0..counts.z {
        for j in 0..counts.y {
            for i in 0..counts.x {
                let mut pos = origin + Vec3::new(i as f32, j as f32, k as f32) * spacing;
                if jitter > 0.0 {
                    pos += Vec3::new(
                        rand::random::<f32>() - 0.5,
                        rand::random::<f32>() - 0.5,
                        rand::random::<f32>() - 0.5,
                    ) * jitter;
                }
                positions.push(pos);
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_system() -> ParticleSystem {
        let positions = sample_block(Vec3::splat(0.25), UVec3::splat(2), 0.05, 0.0);
        ParticleSystem::new(positions, Vec3::ZERO, Vec3::ONE, 0.1, 0.125)
    }

    #[test]
    fn test_construction_zeroes_dynamic_state() {
        let system = small_system();
        assert_eq!(system.len(), 8);
        assert!(system.velocities.iter().all(|v| *v == Vec3::ZERO));
        assert!(system.pressures.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_boundary_clamps_and_zeroes_outward_velocity() {
        let mut system = small_system();
        system.positions[0] = Vec3::new(-0.1, 0.5, 1.2);
        system.velocities[0] = Vec3::new(-1.0, 0.3, 2.0);

        system.apply_boundary(0);

        assert_eq!(system.positions[0], Vec3::new(0.0, 0.5, 1.0));
        // Outward components zeroed, tangential kept.
        assert_eq!(system.velocities[0], Vec3::new(0.0, 0.3, 0.0));
    }

    #[test]
    fn test_boundary_keeps_inward_velocity() {
        let mut system = small_system();
        system.positions[0] = Vec3::new(-0.1, 0.5, 0.5);
        system.velocities[0] = Vec3::new(0.7, 0.0, 0.0);

        system.apply_boundary(0);

        assert_eq!(system.positions[0].x, 0.0);
        assert_eq!(system.velocities[0].x, 0.7);
    }

    #[test]
    fn test_reset_restores_snapshot() {
        let mut system = small_system();
        let initial = system.positions.clone();

        system.positions[3] = Vec3::splat(0.9);
        system.velocities[3] = Vec3::splat(1.0);
        system.pressures[3] = 42.0;

        system.reset();

        assert_eq!(system.positions, initial);
        assert!(system.velocities.iter().all(|v| *v == Vec3::ZERO));
        assert!(system.pressures.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_build_neighbors_rest_lattice() {
        let mut system = small_system();
        system.build_neighbors();

        // In a 2x2x2 cube at spacing 0.05 with support 0.1, every particle
        // sees the other 7 (the far corner sits at sqrt(3)*0.05 < 0.1).
        for (i, list) in system.neighbors.iter().enumerate() {
            assert_eq!(list.len(), 7, "particle {} has {} neighbors", i, list.len());
        }
    }

    #[test]
    fn test_sample_block_counts_and_spacing() {
        let positions = sample_block(Vec3::ZERO, UVec3::new(3, 2, 1), 0.1, 0.0);
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], Vec3::ZERO);
        assert!((positions[1].x - 0.1).abs() < 1e-6);
    }
}
