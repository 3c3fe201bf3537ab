//! # Density Field Producers
//!
//! The engine never generates terrain itself; it consumes a flat density
//! array from a [`DensitySource`] collaborator exactly once per chunk, at
//! chunk creation. What the scalar field means — noise, an SDF, data loaded
//! from disk — is the producer's business.
//!
//! [`PerlinSource`] is the stock producer used by the demo binary and the
//! tests: 3D Perlin noise sampled in world space, so neighboring chunks
//! agree along their shared faces.

use cgmath::Vector3;
use noise::{NoiseFn, Perlin};

/// Produces the initial density field for a chunk.
///
/// The returned vector must have length `resolution³`, laid out as
/// `x + y·resolution + z·resolution²`. Values below the engine's iso level
/// are inside solid terrain.
pub trait DensitySource: Send + Sync {
    /// Samples a `resolution³` density grid whose sample `(x, y, z)` sits at
    /// world position `origin + (x, y, z) · cell_size`.
    fn sample_field(&self, resolution: usize, origin: Vector3<f32>, cell_size: f32) -> Vec<f32>;
}

/// Scaling factor applied to world coordinates before sampling Perlin noise.
const PERLIN_SCALE_FACTOR: f64 = 0.05;

/// Vertical bias per world unit of height, pulling the surface toward a
/// rolling ground plane instead of free-floating blobs.
const HEIGHT_BIAS: f64 = 0.08;

/// A Perlin-noise density producer.
///
/// Density is the raw noise value plus a height bias, so the zero iso level
/// cuts a hilly ground surface with caves where the noise dips hard.
pub struct PerlinSource {
    perlin: Perlin,
}

impl PerlinSource {
    /// Creates a source seeded for reproducible terrain.
    pub fn new(seed: u32) -> Self {
        PerlinSource {
            perlin: Perlin::new(seed),
        }
    }

    fn to_perlin_pos(world: Vector3<f64>) -> [f64; 3] {
        [
            world.x * PERLIN_SCALE_FACTOR,
            world.y * PERLIN_SCALE_FACTOR,
            world.z * PERLIN_SCALE_FACTOR,
        ]
    }
}

impl DensitySource for PerlinSource {
    fn sample_field(&self, resolution: usize, origin: Vector3<f32>, cell_size: f32) -> Vec<f32> {
        let mut field = Vec::with_capacity(resolution * resolution * resolution);

        for z in 0..resolution {
            for y in 0..resolution {
                for x in 0..resolution {
                    let world = Vector3::new(
                        origin.x as f64 + x as f64 * cell_size as f64,
                        origin.y as f64 + y as f64 * cell_size as f64,
                        origin.z as f64 + z as f64 * cell_size as f64,
                    );
                    let sample = self.perlin.get(Self::to_perlin_pos(world));
                    field.push((sample + world.y * HEIGHT_BIAS) as f32);
                }
            }
        }

        field
    }
}
