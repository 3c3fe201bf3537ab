#![warn(missing_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Isoterrain
//!
//! A voxel terrain meshing and streaming engine: marching-cubes isosurface
//! extraction over scalar density fields, chunk-based streaming around a
//! focus point, brush-driven terrain editing with incremental remeshing, and
//! a bounded worker pool that keeps extraction off the coordinating thread.
//!
//! ## Key Modules
//!
//! * `meshing` - the isosurface extractor and its lookup tables
//! * `chunk` - per-region density ownership, brush edits, dirty tracking
//! * `manager` - chunk streaming, job queueing, and dispatch coordination
//! * `jobs` - the mesh worker pool and its transport protocol
//! * `field` - the density producer seam and the stock Perlin implementation
//!
//! ## Architecture
//!
//! One coordinating context (the [`ChunkManager`]) owns every chunk, the job
//! queue, and the in-flight set. Worker threads only ever see immutable job
//! payloads and answer with finished buffers, so no state is shared and no
//! locks exist anywhere in the engine. Rendering is out of scope: the
//! manager emits [`MeshEvent`]s and an external renderer turns them into
//! drawables however it likes.
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::Vector3;
//! use isoterrain::{ChunkManager, EngineConfig, PerlinSource};
//!
//! let config = EngineConfig::default();
//! let mut manager = ChunkManager::new(config, Box::new(PerlinSource::new(0))).unwrap();
//!
//! manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
//! loop {
//!     manager.update();
//!     for event in manager.drain_events() {
//!         // hand geometry to the renderer
//!         let _ = event;
//!     }
//!     # break;
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod field;
pub mod jobs;
pub mod manager;
pub mod meshing;

pub use chunk::{Chunk, ChunkKey, DirtyRegion};
pub use config::EngineConfig;
pub use error::EngineError;
pub use field::{DensitySource, PerlinSource};
pub use manager::{ChunkManager, MeshEvent};
pub use meshing::mesh::{MeshBuffers, MeshVertex};
pub use meshing::{extract, Bounds, ExtractOptions};
