//! Job transport types.
//!
//! A mesh job crosses an execution-context boundary, so both directions are
//! plain serializable data: the request carries an immutable density
//! snapshot plus everything the extractor needs, the response carries either
//! finished geometry or a tagged error description. Chunk keys travel as raw
//! `[i32; 3]` triples to keep the wire types free of math-crate details.

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkKey;
use crate::meshing::mesh::MeshBuffers;

/// A meshing request for one chunk, self-contained and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshRequest {
    /// Chunk-grid coordinate of the owning chunk.
    pub key: [i32; 3],
    /// Incarnation of the owning chunk at enqueue time. Echoed back in the
    /// response so the coordinator can tell a live chunk's result from one
    /// belonging to an evicted (and possibly re-created) incarnation.
    pub generation: u64,
    /// Snapshot of the chunk's density field at enqueue time.
    pub density: Vec<f32>,
    /// Samples per axis; `density` must have length `resolution³`.
    pub resolution: usize,
    /// Iso level defining the surface.
    pub iso_level: f32,
    /// World-space minimum corner of the chunk.
    pub bounds_min: [f32; 3],
    /// World-space maximum corner of the chunk.
    pub bounds_max: [f32; 3],
    /// Weld near-identical vertices within the pass.
    pub seamless: bool,
    /// Emit back faces as well.
    pub double_sided: bool,
    /// Extend extraction one cell past the field boundary.
    pub close_boundary: bool,
}

/// The outcome of a mesh job, reported back to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MeshResponse {
    /// Extraction finished; the geometry is ready to install.
    Completed {
        /// Chunk-grid coordinate of the owning chunk.
        key: [i32; 3],
        /// Incarnation echoed from the request.
        generation: u64,
        /// The extracted geometry.
        mesh: MeshBuffers,
    },
    /// The job could not produce geometry. The owning chunk keeps its
    /// last-good mesh; there is no automatic retry.
    Failed {
        /// Chunk-grid coordinate of the owning chunk.
        key: [i32; 3],
        /// Incarnation echoed from the request.
        generation: u64,
        /// Human-readable description of what went wrong.
        error: String,
    },
}

impl MeshResponse {
    /// The chunk key this response belongs to.
    pub fn key(&self) -> ChunkKey {
        let raw = match self {
            MeshResponse::Completed { key, .. } => key,
            MeshResponse::Failed { key, .. } => key,
        };
        ChunkKey::new(raw[0], raw[1], raw[2])
    }

    /// The chunk incarnation that produced this response.
    pub fn generation(&self) -> u64 {
        match self {
            MeshResponse::Completed { generation, .. } => *generation,
            MeshResponse::Failed { generation, .. } => *generation,
        }
    }
}
