//! Uniform spatial grid for neighbor search.
//!
//! Linked-cell scheme: `heads[cell]` holds the first particle index binned
//! into a cell and `next[i]` chains to the rest. Cells are sized by the
//! kernel support radius so a 3x3x3 cell sweep covers every candidate
//! neighbor. Build is serial, queries are read-only and safe to run from
//! parallel passes.

use glam::{IVec3, UVec3, Vec3};

pub struct SpatialGrid {
    cell_size: f32,
    origin: Vec3,
    dims: UVec3,
    heads: Vec<i32>,
    next: Vec<i32>,
}

impl SpatialGrid {
    /// Create a grid covering `[box_min, box_max]` with cells of `cell_size`.
    pub fn new(box_min: Vec3, box_max: Vec3, cell_size: f32) -> Self {
        let dims = ((box_max - box_min) / cell_size)
            .ceil()
            .as_uvec3()
            .max(UVec3::ONE);
        let num_cells = (dims.x * dims.y * dims.z) as usize;
        Self {
            cell_size,
            origin: box_min,
            dims,
            heads: vec![-1; num_cells],
            next: Vec::new(),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell coordinate of a position. Positions outside the domain bin into
    /// the nearest boundary cell so strays keep their neighborhoods.
    #[inline]
    fn cell_of(&self, pos: Vec3) -> IVec3 {
        ((pos - self.origin) / self.cell_size)
            .floor()
            .as_ivec3()
            .clamp(IVec3::ZERO, self.dims.as_ivec3() - IVec3::ONE)
    }

    #[inline]
    fn cell_index(&self, cell: IVec3) -> Option<usize> {
        if cell.x < 0
            || cell.y < 0
            || cell.z < 0
            || cell.x as u32 >= self.dims.x
            || cell.y as u32 >= self.dims.y
            || cell.z as u32 >= self.dims.z
        {
            return None;
        }
        Some(((cell.z as u32 * self.dims.y + cell.y as u32) * self.dims.x + cell.x as u32) as usize)
    }

    /// Rebin all particles. Serial, but cheap relative to the kernel passes.
    pub fn build(&mut self, positions: &[Vec3]) {
        self.heads.fill(-1);
        self.next.clear();
        self.next.resize(positions.len(), -1);

        for (i, &pos) in positions.iter().enumerate() {
            // cell_of clamps, so the index is always valid here
            if let Some(cell) = self.cell_index(self.cell_of(pos)) {
                self.next[i] = self.heads[cell];
                self.heads[cell] = i as i32;
            }
        }
    }

    /// Collect indices of all particles within `radius` of particle `i`,
    /// excluding `i` itself. Reuses `out`'s allocation.
    pub fn collect_neighbors(&self, i: usize, positions: &[Vec3], radius: f32, out: &mut Vec<usize>) {
        out.clear();
        let pos_i = positions[i];
        let r2_max = radius * radius;
        let center = self.cell_of(pos_i);

        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(cell) = self.cell_index(center + IVec3::new(dx, dy, dz)) else {
                        continue;
                    };
                    let mut j = self.heads[cell];
                    while j != -1 {
                        let j_idx = j as usize;
                        if j_idx != i && positions[j_idx].distance_squared(pos_i) < r2_max {
                            out.push(j_idx);
                        }
                        j = self.next[j_idx];
                    }
                }
            }
        }
    }
}
