//! Mesh buffer types produced by isosurface extraction.
//!
//! A [`MeshBuffers`] is plain data: world-space vertex positions, parallel
//! vertex normals, and a triangle index sequence. It crosses the worker
//! boundary inside a job response and is handed unchanged to whatever
//! renderer consumes the engine, so everything here is serializable and the
//! interleaved vertex view is `Pod` for direct GPU upload.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// One interleaved vertex, laid out for direct upload to a vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct MeshVertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Unit surface normal.
    pub normal: [f32; 3],
}

/// Geometry for one chunk: parallel position/normal arrays plus triangle
/// indices. Produced fresh by every extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
    /// World-space vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex unit normals, parallel to `positions`.
    pub normals: Vec<[f32; 3]>,
    /// Triangle index sequence; length is always a multiple of 3.
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    /// Creates empty buffers.
    pub fn new() -> Self {
        MeshBuffers::default()
    }

    /// Number of emitted vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of emitted triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the pass emitted no geometry at all.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Builds the interleaved vertex array an external renderer uploads.
    pub fn interleaved(&self) -> Vec<MeshVertex> {
        self.positions
            .iter()
            .zip(self.normals.iter())
            .map(|(&position, &normal)| MeshVertex { position, normal })
            .collect()
    }
}
