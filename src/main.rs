//! # Headless Streaming Demo
//!
//! Runs the engine without a renderer: streams chunks around a moving focus
//! point, carves a few brush strokes into the terrain, and logs what the
//! worker pool produces. Useful as a smoke test and as a reference for
//! wiring the manager into a host application.
//!
//! ```bash
//! RUST_LOG=info cargo run --release [config.json]
//! ```

use cgmath::Vector3;
use log::info;

use isoterrain::{ChunkManager, EngineConfig, MeshEvent, PerlinSource};

fn main() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json_file(&path).unwrap_or_else(|error| {
            eprintln!("could not load {path}: {error}");
            std::process::exit(1);
        }),
        None => EngineConfig {
            resolution: 16,
            chunk_size: 16.0,
            render_distance: 2.0,
            ..EngineConfig::default()
        },
    };

    info!(
        "starting demo: resolution {}, render distance {}, {} worker(s)",
        config.resolution, config.render_distance, config.workers
    );

    let mut manager = match ChunkManager::new(config, Box::new(PerlinSource::new(42))) {
        Ok(manager) => manager,
        Err(error) => {
            eprintln!("engine construction failed: {error}");
            std::process::exit(1);
        }
    };

    let mut meshed = 0usize;
    for frame in 0..600u32 {
        // Drift the focus along x so chunks stream in ahead and out behind.
        let focus = Vector3::new(frame as f32 * 0.5, 0.0, 0.0);
        manager.set_focus(focus);

        // Periodically dig a hole just ahead of the focus.
        if frame % 120 == 60 {
            let dug = manager.request_edit(focus + Vector3::new(8.0, 0.0, 0.0), 4.0, 1.5, true);
            info!("frame {frame}: brush stroke applied = {dug}");
        }

        manager.update();
        for event in manager.drain_events() {
            match event {
                MeshEvent::Updated { key, mesh } => {
                    meshed += 1;
                    info!(
                        "mesh for ({}, {}, {}): {} vertices / {} triangles",
                        key.x,
                        key.y,
                        key.z,
                        mesh.vertex_count(),
                        mesh.triangle_count()
                    );
                }
                MeshEvent::Removed { key } => {
                    info!("chunk ({}, {}, {}) streamed out", key.x, key.y, key.z);
                }
            }
        }

        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    info!(
        "demo finished: {} meshes built, {} chunks active, queue depth {}",
        meshed,
        manager.chunk_count(),
        manager.queue_depth()
    );
}
