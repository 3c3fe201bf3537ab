//! # Engine Configuration
//!
//! All tunables for the streaming engine live in [`EngineConfig`]: grid
//! resolution and world size of a chunk, the iso level, the streaming radius,
//! worker pool sizing, and the extraction flags. The struct deserializes from
//! JSON so a deployment can ship its tuning as a data file, and every field
//! has a default so partial files work.
//!
//! There is deliberately no global config instance; the manager takes an
//! owned `EngineConfig` at construction and nothing else reads it.

use serde::Deserialize;
use std::path::Path;
use std::thread;

use crate::error::EngineError;

/// Configuration for a [`ChunkManager`](crate::manager::ChunkManager) and the
/// extraction passes it dispatches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per axis of a chunk's density field. The field length is
    /// always `resolution³`.
    pub resolution: usize,
    /// World-space edge length of a chunk cube.
    pub chunk_size: f32,
    /// Scalar threshold defining the extracted surface. Values below it are
    /// inside solid.
    pub iso_level: f32,
    /// Streaming radius around the focus point, in chunk units (Euclidean).
    pub render_distance: f32,
    /// Number of mesh worker slots. Zero is allowed and disables dispatch,
    /// which is useful for deterministic tests.
    pub workers: usize,
    /// Weld near-identical vertices within one extraction pass.
    pub seamless: bool,
    /// Emit every triangle twice with opposite winding.
    pub double_sided: bool,
    /// Extend extraction one cell beyond each field boundary, synthesizing
    /// the missing samples, so the surface closes at chunk edges.
    pub close_boundary: bool,
    /// Optional cap on queued mesh jobs. When the queue is full the oldest
    /// pending job is dropped. `None` leaves the queue unbounded.
    pub max_queued_jobs: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            resolution: 32,
            chunk_size: 16.0,
            iso_level: 0.0,
            render_distance: 3.0,
            workers: default_worker_count(),
            seamless: true,
            double_sided: false,
            close_boundary: true,
            max_queued_jobs: None,
        }
    }
}

/// Default worker pool size: available parallelism minus one, keeping a core
/// free for the coordinating context. Never less than one.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
}

impl EngineConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults, so a file may specify only
    /// the values it cares about.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the value ranges the rest of the engine relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.resolution < 2 {
            return Err(EngineError::InvalidConfig {
                field: "resolution",
                reason: format!("{} is below the 2-sample minimum", self.resolution),
            });
        }
        if !(self.chunk_size > 0.0) {
            return Err(EngineError::InvalidConfig {
                field: "chunk_size",
                reason: format!("{} is not a positive size", self.chunk_size),
            });
        }
        if !(self.render_distance >= 0.0) {
            return Err(EngineError::InvalidConfig {
                field: "render_distance",
                reason: format!("{} is not a valid radius", self.render_distance),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "resolution": 8, "render_distance": 1.0 }"#).unwrap();
        assert_eq!(config.resolution, 8);
        assert_eq!(config.render_distance, 1.0);
        assert_eq!(config.chunk_size, EngineConfig::default().chunk_size);
        assert!(config.seamless);
    }

    #[test]
    fn rejects_degenerate_values() {
        let config = EngineConfig {
            resolution: 1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            chunk_size: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_default_leaves_a_core_free() {
        assert!(default_worker_count() >= 1);
    }
}
