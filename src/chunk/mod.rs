//! # Chunk
//!
//! A chunk owns one cubic region of the world: its density field, the mesh
//! derived from it, and the dirty bookkeeping that drives incremental
//! remeshing. Chunks are created by the manager when their grid cell comes
//! within render distance, edited in place by brush strokes, and disposed
//! when they stream out.
//!
//! The density field length is always `resolution³`; the dirty region, when
//! present, always lies within `[0, resolution − 1]` per axis.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::field::DensitySource;
use crate::meshing::mesh::MeshBuffers;
use crate::meshing::{extract, Bounds, ExtractOptions};

/// Integer chunk-grid coordinate, the unique key of a chunk.
pub type ChunkKey = Point3<i32>;

/// Grid-cell bounding box of edits since the last remesh, inclusive on both
/// ends and clamped to the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    /// Minimum affected cell per axis.
    pub min: [usize; 3],
    /// Maximum affected cell per axis.
    pub max: [usize; 3],
}

impl DirtyRegion {
    fn expand(&mut self, cell: [usize; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(cell[axis]);
            self.max[axis] = self.max[axis].max(cell[axis]);
        }
    }
}

/// One fixed-size cubic region of terrain with its own density field and
/// derived mesh.
pub struct Chunk {
    key: ChunkKey,
    resolution: usize,
    bounds: Bounds,
    density: Vec<f32>,
    mesh: Option<MeshBuffers>,
    dirty_region: Option<DirtyRegion>,
    dirty: bool,
}

impl Chunk {
    /// Creates a chunk at grid cell `key`, filling its density field once
    /// from the producing collaborator.
    ///
    /// `resolution` must be at least 2: a cell needs two samples per axis.
    pub fn new(
        key: ChunkKey,
        resolution: usize,
        chunk_size: f32,
        source: &dyn DensitySource,
    ) -> Self {
        debug_assert!(resolution >= 2, "chunk resolution must be at least 2");
        let origin = Vector3::new(
            key.x as f32 * chunk_size,
            key.y as f32 * chunk_size,
            key.z as f32 * chunk_size,
        );
        let bounds = Bounds::cube(origin, chunk_size);
        let cell_size = chunk_size / (resolution - 1) as f32;
        let density = source.sample_field(resolution, origin, cell_size);
        debug_assert_eq!(density.len(), resolution * resolution * resolution);

        Chunk {
            key,
            resolution,
            bounds,
            density,
            mesh: None,
            dirty_region: None,
            dirty: false,
        }
    }

    /// The chunk-grid coordinate of this chunk.
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// World-space bounds of this chunk.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Samples per axis of the density field.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// World-space spacing between adjacent grid samples.
    pub fn cell_size(&self) -> f32 {
        (self.bounds.max.x - self.bounds.min.x) / (self.resolution - 1) as f32
    }

    /// The current density field.
    pub fn density(&self) -> &[f32] {
        &self.density
    }

    /// An owned copy of the density field, the immutable payload a mesh job
    /// carries across the worker boundary.
    pub fn snapshot(&self) -> Vec<f32> {
        self.density.clone()
    }

    /// The most recently installed mesh, if any.
    pub fn mesh(&self) -> Option<&MeshBuffers> {
        self.mesh.as_ref()
    }

    /// Replaces the mesh with geometry returned by a worker.
    pub fn install_mesh(&mut self, mesh: MeshBuffers) {
        self.mesh = Some(mesh);
    }

    /// Whether edits have landed since the last remesh or snapshot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The bounding box of edits since the last remesh. Bookkeeping only:
    /// remeshing is always full-field, because gradient sampling reads
    /// neighbors outside the nominally dirty box.
    pub fn dirty_region(&self) -> Option<DirtyRegion> {
        self.dirty_region
    }

    /// Clears dirty tracking. Called by the owner once the current field
    /// state has been captured for meshing.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        self.dirty_region = None;
    }

    /// Re-flags the chunk as dirty without touching the region box. Used by
    /// the owner when a captured snapshot had to be thrown away.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Applies a spherical brush stroke to the density field.
    ///
    /// Every grid cell whose center lies within `radius` of `world_position`
    /// is adjusted by `strength · falloff²`, with
    /// `falloff = 1 − clamp(distance / radius, 0, 1)`: full strength at the
    /// sphere center, fading smoothly to zero at its boundary. Additive
    /// edits subtract density (lower density is more solid), subtractive
    /// edits add it.
    ///
    /// Returns whether any cell actually changed. Expands the dirty region
    /// across calls until the owner clears it.
    pub fn apply_brush(
        &mut self,
        world_position: Vector3<f32>,
        radius: f32,
        strength: f32,
        additive: bool,
    ) -> bool {
        if radius <= 0.0 {
            return false;
        }

        let cell_size = self.cell_size();
        let local = (world_position - self.bounds.min) / cell_size;
        let radius_cells = radius / cell_size;
        let last = self.resolution - 1;

        // Clamped cell range the sphere can reach.
        let lo = |c: f32| ((c - radius_cells).ceil().max(0.0)) as usize;
        let hi = |c: f32| ((c + radius_cells).floor().min(last as f32).max(0.0)) as usize;
        let (x0, x1) = (lo(local.x), hi(local.x));
        let (y0, y1) = (lo(local.y), hi(local.y));
        let (z0, z1) = (lo(local.z), hi(local.z));

        let mut changed = false;
        for z in z0..=z1 {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let center = self.bounds.min
                        + Vector3::new(x as f32, y as f32, z as f32) * cell_size;
                    let distance = (center - world_position).magnitude();
                    if distance >= radius {
                        continue;
                    }

                    let falloff = 1.0 - (distance / radius).clamp(0.0, 1.0);
                    let delta = strength * falloff * falloff;
                    if delta == 0.0 {
                        continue;
                    }

                    let index = x + y * self.resolution + z * self.resolution * self.resolution;
                    if additive {
                        self.density[index] -= delta;
                    } else {
                        self.density[index] += delta;
                    }

                    changed = true;
                    let cell = [x, y, z];
                    match self.dirty_region.as_mut() {
                        Some(region) => region.expand(cell),
                        None => self.dirty_region = Some(DirtyRegion { min: cell, max: cell }),
                    }
                }
            }
        }

        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Re-extracts the mesh from the current density field and clears dirty
    /// state. This is the synchronous path; the streaming manager does the
    /// same work through a worker instead.
    pub fn remesh(&mut self, iso_level: f32, options: &ExtractOptions) {
        let resolution = self.resolution;
        let mesh = extract(
            &self.density,
            [resolution, resolution, resolution],
            iso_level,
            self.bounds,
            options,
        );
        log::debug!(
            "remeshed chunk ({}, {}, {}): {} vertices, {} triangles",
            self.key.x,
            self.key.y,
            self.key.z,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        self.mesh = Some(mesh);
        self.clear_dirty();
    }

    /// Releases the mesh and density storage. The chunk is unusable
    /// afterwards and must be dropped by its owner.
    pub fn dispose(&mut self) {
        self.mesh = None;
        self.density = Vec::new();
        self.dirty_region = None;
        self.dirty = false;
    }
}
