//! # Isosurface Extraction
//!
//! Marching-cubes extraction of a triangle mesh from a flat scalar density
//! field. This is a pure function of its inputs: the same field, iso level,
//! bounds, and options always produce the same buffers, and the field is
//! never mutated.
//!
//! ## Pass Structure
//!
//! For every lattice cell the extractor samples the 8 corners, classifies
//! them against the iso level into an 8-bit configuration, and walks the
//! triangle table entry for that configuration. Each referenced edge is
//! interpolated once into a world-space crossing point with a
//! finite-difference gradient normal, and the edge list is emitted in runs
//! of three as triangles.
//!
//! ## Edge Cases
//!
//! - Near-flat spans (`|v2 − v1|` under a numeric threshold) interpolate at
//!   the midpoint instead of dividing by almost zero.
//! - Near-zero gradients fall back to a fixed up normal.
//! - With boundary closure enabled, the cell walk extends one cell beyond
//!   the field on every side; the missing samples are synthesized by
//!   inverse-distance-weighted extrapolation from in-range neighbors, or a
//!   solid default when no neighbor is close enough, so the surface caps
//!   instead of ripping open at the field edge.
//! - NaN samples are treated as missing and substituted the same way. No
//!   input makes extraction fail.
//!
//! ## Seamless Mode
//!
//! With `seamless` set, each emitted vertex position is quantized to a fixed
//! decimal precision and looked up in a pass-scoped cache, so near-identical
//! crossing points collapse to one vertex. The cache never outlives the
//! pass: two independently meshed neighboring chunks do not share vertices,
//! which is a documented limitation of the engine.

pub mod mesh;
pub mod tables;

use cgmath::{InnerSpace, Vector3};
use std::collections::HashMap;

use mesh::MeshBuffers;
use tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};

/// Axis-aligned world-space bounds of an extraction region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vector3<f32>,
    /// Maximum corner.
    pub max: Vector3<f32>,
}

impl Bounds {
    /// Bounds spanning `min` to `min + size` on every axis.
    pub fn cube(min: Vector3<f32>, size: f32) -> Self {
        Bounds {
            min,
            max: min + Vector3::new(size, size, size),
        }
    }

    /// Whether this box could intersect the given sphere. Used by the
    /// manager's edit broad phase.
    pub fn intersects_sphere(&self, center: Vector3<f32>, radius: f32) -> bool {
        let clamped = Vector3::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
            center.z.clamp(self.min.z, self.max.z),
        );
        (clamped - center).magnitude2() <= radius * radius
    }
}

/// Extraction pass options.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Weld near-identical vertices within this pass.
    pub seamless: bool,
    /// Emit every triangle a second time with reversed winding.
    pub double_sided: bool,
    /// Extend the cell walk one cell beyond each field boundary.
    pub close_boundary: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            seamless: true,
            double_sided: false,
            close_boundary: true,
        }
    }
}

/// Interpolation parameter clamp, keeping crossings strictly inside an edge.
const T_EPSILON: f32 = 1.0e-4;
/// Below this span between corner values the crossing sits at the midpoint.
const FLAT_SPAN_THRESHOLD: f32 = 1.0e-6;
/// Below this squared magnitude a gradient counts as degenerate.
const GRADIENT_THRESHOLD: f32 = 1.0e-12;
/// Normal used when the density gradient vanishes.
const FALLBACK_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];
/// Quantization steps per world unit for seamless vertex welding.
const WELD_PRECISION: f32 = 1.0e4;
/// Neighbor search radius (in cells) for synthesizing out-of-range samples.
const SYNTHESIS_RADIUS: i32 = 2;

/// Extracts the isosurface of `density` as a triangle mesh.
///
/// `density` is indexed `x + y·nx + z·nx·ny` over `dims = [nx, ny, nz]`;
/// values below `iso_level` are inside solid. `bounds` maps grid coordinates
/// affinely into world space, with grid `(0,0,0)` at `bounds.min` and grid
/// `dims − 1` at `bounds.max`.
///
/// A mismatched field length is logged and yields empty buffers; nothing
/// here is fatal.
pub fn extract(
    density: &[f32],
    dims: [usize; 3],
    iso_level: f32,
    bounds: Bounds,
    options: &ExtractOptions,
) -> MeshBuffers {
    let [nx, ny, nz] = dims;
    if nx < 2 || ny < 2 || nz < 2 || density.len() != nx * ny * nz {
        log::error!(
            "density field of length {} does not match dims {:?}; emitting no geometry",
            density.len(),
            dims
        );
        return MeshBuffers::new();
    }

    let sampler = FieldSampler {
        density,
        dims,
        solid_default: iso_level - 1.0,
    };
    let cell_size = Vector3::new(
        (bounds.max.x - bounds.min.x) / (nx - 1) as f32,
        (bounds.max.y - bounds.min.y) / (ny - 1) as f32,
        (bounds.max.z - bounds.min.z) / (nz - 1) as f32,
    );

    let mut emitter = VertexEmitter::new(options.seamless);

    // One cell of margin on each side closes the surface over the field
    // edge; the synthesized samples default to solid out there.
    let margin = if options.close_boundary { 1 } else { 0 };
    let (x0, x1) = (-margin, (nx as i32 - 1) + margin);
    let (y0, y1) = (-margin, (ny as i32 - 1) + margin);
    let (z0, z1) = (-margin, (nz as i32 - 1) + margin);

    for z in z0..z1 {
        for y in y0..y1 {
            for x in x0..x1 {
                process_cell(
                    &sampler,
                    x,
                    y,
                    z,
                    iso_level,
                    bounds.min,
                    cell_size,
                    options,
                    &mut emitter,
                );
            }
        }
    }

    emitter.finish()
}

/// Runs marching cubes over one lattice cell.
#[allow(clippy::too_many_arguments)]
fn process_cell(
    sampler: &FieldSampler<'_>,
    x: i32,
    y: i32,
    z: i32,
    iso_level: f32,
    world_min: Vector3<f32>,
    cell_size: Vector3<f32>,
    options: &ExtractOptions,
    emitter: &mut VertexEmitter,
) {
    let mut corner_values = [0.0f32; 8];
    for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
        corner_values[i] = sampler.sample(x + offset[0] as i32, y + offset[1] as i32, z + offset[2] as i32);
    }

    let mut configuration = 0usize;
    for (i, &value) in corner_values.iter().enumerate() {
        if value < iso_level {
            configuration |= 1 << i;
        }
    }

    // Fully inside or fully outside: no geometry for this cell.
    if EDGE_TABLE[configuration] == 0 {
        return;
    }

    // Interpolate each referenced edge exactly once.
    let mut edge_positions = [Vector3::new(0.0f32, 0.0, 0.0); 12];
    let mut edge_normals = [Vector3::new(0.0f32, 0.0, 0.0); 12];
    for edge in 0..12 {
        if EDGE_TABLE[configuration] & (1 << edge) == 0 {
            continue;
        }
        let [c0, c1] = EDGE_CONNECTIONS[edge];
        let t = interpolation_parameter(corner_values[c0], corner_values[c1], iso_level);

        let g0 = grid_corner(x, y, z, c0);
        let g1 = grid_corner(x, y, z, c1);
        let grid_pos = g0 + (g1 - g0) * t;

        edge_positions[edge] = Vector3::new(
            world_min.x + grid_pos.x * cell_size.x,
            world_min.y + grid_pos.y * cell_size.y,
            world_min.z + grid_pos.z * cell_size.z,
        );
        edge_normals[edge] = sampler.gradient_normal(grid_pos, cell_size);
    }

    // Emit the edge list in runs of three.
    let entry = &TRI_TABLE[configuration];
    let mut i = 0;
    while entry[i] != -1 {
        let e0 = entry[i] as usize;
        let e1 = entry[i + 1] as usize;
        let e2 = entry[i + 2] as usize;

        let i0 = emitter.emit(edge_positions[e0], edge_normals[e0]);
        let i1 = emitter.emit(edge_positions[e1], edge_normals[e1]);
        let i2 = emitter.emit(edge_positions[e2], edge_normals[e2]);

        emitter.triangle(i0, i1, i2);
        if options.double_sided {
            emitter.triangle(i2, i1, i0);
        }

        i += 3;
    }
}

/// Parameter of the iso crossing along an edge from value `v0` to `v1`,
/// clamped strictly inside the edge. Near-flat spans interpolate at the
/// midpoint instead of dividing by almost zero.
fn interpolation_parameter(v0: f32, v1: f32, iso_level: f32) -> f32 {
    let span = v1 - v0;
    if span.abs() < FLAT_SPAN_THRESHOLD {
        0.5
    } else {
        ((iso_level - v0) / span).clamp(T_EPSILON, 1.0 - T_EPSILON)
    }
}

/// Grid-space position of corner `corner` of the cell at `(x, y, z)`.
fn grid_corner(x: i32, y: i32, z: i32, corner: usize) -> Vector3<f32> {
    let offset = CORNER_OFFSETS[corner];
    Vector3::new(
        (x + offset[0] as i32) as f32,
        (y + offset[1] as i32) as f32,
        (z + offset[2] as i32) as f32,
    )
}

/// Read-only view of a density field with boundary and NaN substitution.
struct FieldSampler<'a> {
    density: &'a [f32],
    dims: [usize; 3],
    /// Value standing in for samples nothing can be extrapolated from;
    /// below the iso level, so unknown space reads as solid.
    solid_default: f32,
}

impl FieldSampler<'_> {
    /// The stored sample at integer grid coordinates, if it exists and is a
    /// real number.
    fn raw(&self, x: i32, y: i32, z: i32) -> Option<f32> {
        let [nx, ny, nz] = self.dims;
        if x < 0 || y < 0 || z < 0 || x >= nx as i32 || y >= ny as i32 || z >= nz as i32 {
            return None;
        }
        let value = self.density[x as usize + y as usize * nx + z as usize * nx * ny];
        value.is_finite().then_some(value)
    }

    /// A sample at arbitrary integer grid coordinates. Out-of-range or NaN
    /// samples are synthesized by inverse-distance weighting of the in-range
    /// neighbors within [`SYNTHESIS_RADIUS`], defaulting to solid when none
    /// are found.
    fn sample(&self, x: i32, y: i32, z: i32) -> f32 {
        if let Some(value) = self.raw(x, y, z) {
            return value;
        }

        let mut weighted = 0.0f32;
        let mut weight_sum = 0.0f32;
        for dz in -SYNTHESIS_RADIUS..=SYNTHESIS_RADIUS {
            for dy in -SYNTHESIS_RADIUS..=SYNTHESIS_RADIUS {
                for dx in -SYNTHESIS_RADIUS..=SYNTHESIS_RADIUS {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    if let Some(value) = self.raw(x + dx, y + dy, z + dz) {
                        let distance = ((dx * dx + dy * dy + dz * dz) as f32).sqrt();
                        let weight = 1.0 / distance;
                        weighted += value * weight;
                        weight_sum += weight;
                    }
                }
            }
        }

        if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            self.solid_default
        }
    }

    /// Trilinear field value at a fractional grid position.
    fn sample_trilinear(&self, p: Vector3<f32>) -> f32 {
        let base = Vector3::new(p.x.floor(), p.y.floor(), p.z.floor());
        let frac = p - base;
        let (bx, by, bz) = (base.x as i32, base.y as i32, base.z as i32);

        let mut value = 0.0f32;
        for corner in 0..8usize {
            let (cx, cy, cz) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
            let wx = if cx == 1 { frac.x } else { 1.0 - frac.x };
            let wy = if cy == 1 { frac.y } else { 1.0 - frac.y };
            let wz = if cz == 1 { frac.z } else { 1.0 - frac.z };
            value += wx * wy * wz * self.sample(bx + cx as i32, by + cy as i32, bz + cz as i32);
        }
        value
    }

    /// Unit surface normal at a fractional grid position: normalized central
    /// difference of the field, falling back to a fixed up vector when the
    /// gradient vanishes.
    fn gradient_normal(&self, p: Vector3<f32>, cell_size: Vector3<f32>) -> Vector3<f32> {
        const H: f32 = 0.5;
        let gradient = Vector3::new(
            (self.sample_trilinear(p + Vector3::new(H, 0.0, 0.0))
                - self.sample_trilinear(p - Vector3::new(H, 0.0, 0.0)))
                / (2.0 * H * cell_size.x),
            (self.sample_trilinear(p + Vector3::new(0.0, H, 0.0))
                - self.sample_trilinear(p - Vector3::new(0.0, H, 0.0)))
                / (2.0 * H * cell_size.y),
            (self.sample_trilinear(p + Vector3::new(0.0, 0.0, H))
                - self.sample_trilinear(p - Vector3::new(0.0, 0.0, H)))
                / (2.0 * H * cell_size.z),
        );

        if gradient.magnitude2() < GRADIENT_THRESHOLD {
            return Vector3::from(FALLBACK_NORMAL);
        }
        gradient.normalize()
    }
}

/// Accumulates emitted vertices and triangles for one pass, welding
/// quantized duplicates when seamless mode is on.
struct VertexEmitter {
    mesh: MeshBuffers,
    cache: Option<HashMap<(i64, i64, i64), u32>>,
}

impl VertexEmitter {
    fn new(seamless: bool) -> Self {
        VertexEmitter {
            mesh: MeshBuffers::new(),
            cache: seamless.then(HashMap::new),
        }
    }

    /// Appends a vertex, or reuses the index of a previously emitted vertex
    /// at the same quantized position.
    fn emit(&mut self, position: Vector3<f32>, normal: Vector3<f32>) -> u32 {
        if let Some(cache) = self.cache.as_mut() {
            let key = (
                (position.x * WELD_PRECISION).round() as i64,
                (position.y * WELD_PRECISION).round() as i64,
                (position.z * WELD_PRECISION).round() as i64,
            );
            if let Some(&index) = cache.get(&key) {
                return index;
            }
            let index = self.mesh.positions.len() as u32;
            self.mesh.positions.push(position.into());
            self.mesh.normals.push(normal.into());
            cache.insert(key, index);
            index
        } else {
            let index = self.mesh.positions.len() as u32;
            self.mesh.positions.push(position.into());
            self.mesh.normals.push(normal.into());
            index
        }
    }

    fn triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.mesh.indices.push(i0);
        self.mesh.indices.push(i1);
        self.mesh.indices.push(i2);
    }

    fn finish(self) -> MeshBuffers {
        self.mesh
    }
}
