//! Manager-level streaming behavior: focus-driven chunk lifecycles, edit
//! coalescing, queue capping, and the asynchronous mesh round trip.

use std::time::Duration;

use cgmath::Vector3;
use isoterrain::{ChunkManager, ChunkKey, DensitySource, EngineConfig, MeshEvent};

/// Flat terrain: solid below `y = height`, air above. Cheap and guarantees
/// a surface through every ground-level chunk.
struct HalfSpaceSource {
    height: f32,
}

impl DensitySource for HalfSpaceSource {
    fn sample_field(&self, resolution: usize, origin: Vector3<f32>, cell_size: f32) -> Vec<f32> {
        let mut field = Vec::with_capacity(resolution * resolution * resolution);
        for z in 0..resolution {
            let _ = z;
            for y in 0..resolution {
                let world_y = origin.y + y as f32 * cell_size;
                for _ in 0..resolution {
                    field.push(world_y - self.height);
                }
            }
        }
        field
    }
}

/// A manager with no worker slots: jobs queue but never dispatch, which
/// makes queue-level assertions deterministic.
fn offline_manager(config: EngineConfig) -> ChunkManager {
    let config = EngineConfig { workers: 0, ..config };
    ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction")
}

/// Pumps the manager until an event satisfies `predicate` or the attempt
/// budget runs out.
fn pump_until(
    manager: &mut ChunkManager,
    mut predicate: impl FnMut(&MeshEvent) -> bool,
) -> bool {
    for _ in 0..2000 {
        manager.update();
        for event in manager.drain_events() {
            if predicate(&event) {
                return true;
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn remesh_of_an_unedited_chunk_is_stable() {
    use isoterrain::{Chunk, ExtractOptions};

    let mut chunk = Chunk::new(
        ChunkKey::new(0, 0, 0),
        8,
        8.0,
        &HalfSpaceSource { height: 4.0 },
    );

    chunk.remesh(0.0, &ExtractOptions::default());
    let first = chunk.mesh().expect("mesh installed").clone();
    chunk.remesh(0.0, &ExtractOptions::default());
    let second = chunk.mesh().expect("mesh installed").clone();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn focus_streams_in_euclidean_neighborhood() {
    let mut manager = offline_manager(EngineConfig {
        render_distance: 1.0,
        ..EngineConfig::default()
    });

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));

    // Cells within Euclidean distance 1 of the focus cell: the center and
    // the six face neighbors. Diagonals are outside the sphere.
    assert_eq!(manager.chunk_count(), 7);
    let keys = manager.active_keys();
    for expected in [
        [0, 0, 0],
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
    ] {
        let key = ChunkKey::new(expected[0], expected[1], expected[2]);
        assert!(keys.contains(&key), "missing chunk {expected:?}");
    }

    // Each new chunk queued its initial mesh job.
    assert_eq!(manager.queue_depth(), 7);
    assert_eq!(manager.in_flight_count(), 0);
}

#[test]
fn moving_focus_far_away_evicts_everything() {
    let chunk_size = EngineConfig::default().chunk_size;
    let mut manager = offline_manager(EngineConfig {
        render_distance: 1.0,
        ..EngineConfig::default()
    });

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    let old_keys = manager.active_keys();
    assert_eq!(old_keys.len(), 7);

    manager.set_focus(Vector3::new(100.0 * chunk_size, 0.0, 0.0));

    for old in &old_keys {
        assert!(manager.chunk(*old).is_none(), "chunk {old:?} not evicted");
    }
    assert_eq!(manager.chunk_count(), 7);

    let removed = manager
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, MeshEvent::Removed { .. }))
        .count();
    assert_eq!(removed, 7);

    // Queued jobs for evicted chunks were cancelled along with them.
    assert_eq!(manager.queue_depth(), 7);
}

#[test]
fn repeated_focus_is_idempotent() {
    let mut manager = offline_manager(EngineConfig {
        render_distance: 1.0,
        ..EngineConfig::default()
    });

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));

    assert_eq!(manager.chunk_count(), 7);
    assert_eq!(manager.queue_depth(), 7);
    assert!(manager
        .drain_events()
        .iter()
        .all(|event| !matches!(event, MeshEvent::Removed { .. })));
}

#[test]
fn edits_before_dispatch_coalesce_into_one_job() {
    let mut manager = offline_manager(EngineConfig {
        render_distance: 0.0,
        ..EngineConfig::default()
    });

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(manager.chunk_count(), 1);
    assert_eq!(manager.queue_depth(), 1);

    // Two strokes against the same chunk before anything dispatches: the
    // queued job's snapshot is refreshed in place, never duplicated.
    let center = Vector3::new(8.0, 8.0, 8.0);
    assert!(manager.request_edit(center, 2.0, 1.0, true));
    assert!(manager.request_edit(center, 2.0, 1.0, false));
    assert_eq!(manager.queue_depth(), 1);

    // With no workers, pumping changes nothing.
    manager.update();
    assert_eq!(manager.queue_depth(), 1);
    assert_eq!(manager.in_flight_count(), 0);
}

#[test]
fn edit_outside_every_chunk_is_a_noop() {
    let mut manager = offline_manager(EngineConfig {
        render_distance: 0.0,
        ..EngineConfig::default()
    });
    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));

    assert!(!manager.request_edit(Vector3::new(1000.0, 0.0, 0.0), 2.0, 1.0, true));
    assert!(!manager.request_edit(Vector3::new(8.0, 8.0, 8.0), 0.0, 1.0, true));
    assert_eq!(manager.queue_depth(), 1);
}

#[test]
fn edit_on_chunk_seam_reaches_both_neighbors() {
    let chunk_size = EngineConfig::default().chunk_size;
    let mut manager = offline_manager(EngineConfig {
        render_distance: 1.0,
        ..EngineConfig::default()
    });
    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));

    // A stroke straddling the x seam between chunks (0,0,0) and (1,0,0).
    assert!(manager.request_edit(
        Vector3::new(chunk_size, chunk_size * 0.5, chunk_size * 0.5),
        2.0,
        1.0,
        true,
    ));

    // Both neighbors must carry cells that deviate from the pristine
    // half-space field.
    for key in [ChunkKey::new(0, 0, 0), ChunkKey::new(1, 0, 0)] {
        let chunk = manager.chunk(key).expect("chunk active");
        let resolution = chunk.resolution();
        let cell_size = chunk.cell_size();
        let min_y = chunk.bounds().min.y;
        let edited = chunk.density().iter().enumerate().any(|(index, &value)| {
            let y = (index / resolution) % resolution;
            let pristine = min_y + y as f32 * cell_size - 4.0;
            (value - pristine).abs() > 1.0e-6
        });
        assert!(edited, "edit did not reach chunk {key:?}");
    }
}

#[test]
fn queue_cap_drops_oldest_jobs() {
    let mut manager = offline_manager(EngineConfig {
        render_distance: 2.0,
        max_queued_jobs: Some(3),
        ..EngineConfig::default()
    });

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));

    // 33 cells lie within Euclidean distance 2; the queue holds only the
    // newest three jobs and the rest stay dirty for a later pass.
    assert_eq!(manager.chunk_count(), 33);
    assert_eq!(manager.queue_depth(), 3);
}

#[test]
fn chunks_mesh_asynchronously_after_streaming_in() {
    let config = EngineConfig {
        resolution: 8,
        chunk_size: 8.0,
        render_distance: 0.0,
        workers: 1,
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction");

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    let key = ChunkKey::new(0, 0, 0);

    let meshed = pump_until(&mut manager, |event| {
        matches!(event, MeshEvent::Updated { key: updated, mesh }
            if *updated == key && !mesh.is_empty())
    });
    assert!(meshed, "initial mesh never arrived");

    let chunk = manager.chunk(key).expect("chunk still active");
    let mesh = chunk.mesh().expect("mesh installed on the chunk");
    assert!(mesh.triangle_count() > 0);
    assert_eq!(manager.in_flight_count(), 0);
}

#[test]
fn edits_trigger_a_follow_up_mesh() {
    let config = EngineConfig {
        resolution: 8,
        chunk_size: 8.0,
        render_distance: 0.0,
        workers: 1,
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction");

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    let key = ChunkKey::new(0, 0, 0);

    assert!(pump_until(&mut manager, |event| {
        matches!(event, MeshEvent::Updated { key: updated, .. } if *updated == key)
    }));

    // Dig a hole through the surface. Whether the stroke lands while a job
    // is queued, in flight, or idle, exactly one more mesh must follow.
    assert!(manager.request_edit(Vector3::new(4.0, 4.0, 4.0), 3.0, 10.0, true));

    assert!(
        pump_until(&mut manager, |event| {
            matches!(event, MeshEvent::Updated { key: updated, .. } if *updated == key)
        }),
        "follow-up mesh never arrived"
    );
    assert!(!manager.chunk(key).expect("chunk active").is_dirty());
}

#[test]
fn recreated_chunk_queues_a_fresh_mesh_job() {
    use isoterrain::{Chunk, ExtractOptions};

    let config = EngineConfig {
        resolution: 8,
        chunk_size: 8.0,
        render_distance: 0.0,
        workers: 1,
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction");
    let key = ChunkKey::new(0, 0, 0);

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    assert!(manager.request_edit(Vector3::new(4.0, 4.0, 4.0), 3.0, 10.0, true));
    manager.update(); // dispatch the edited snapshot
    assert_eq!(manager.in_flight_count(), 1);

    // Evict while the job is still bound to the worker, then come straight
    // back to the same cell.
    manager.set_focus(Vector3::new(800.0, 0.0, 0.0));
    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    assert!(manager.chunk(key).is_some());

    // The re-created chunk owns its own first mesh job; the dead
    // incarnation's running job must not stand in for it.
    assert_eq!(manager.queue_depth(), 1);

    assert!(pump_until(&mut manager, |event| {
        matches!(event, MeshEvent::Updated { key: updated, .. } if *updated == key)
    }));

    // The installed mesh is the pristine field's, not the evicted
    // incarnation's edited one.
    let mut pristine = Chunk::new(key, 8, 8.0, &HalfSpaceSource { height: 4.0 });
    pristine.remesh(0.0, &ExtractOptions::default());
    assert_eq!(
        manager.chunk(key).and_then(|chunk| chunk.mesh()),
        pristine.mesh()
    );
}

#[test]
fn capped_out_chunks_still_mesh_eventually() {
    use std::collections::HashSet;

    let config = EngineConfig {
        resolution: 8,
        chunk_size: 8.0,
        render_distance: 1.0,
        workers: 1,
        max_queued_jobs: Some(2),
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction");

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(manager.chunk_count(), 7);
    // Five of the seven initial jobs fell off the capped queue.
    assert_eq!(manager.queue_depth(), 2);

    // Pumping must sweep the capped-out chunks back in until every chunk
    // has meshed once.
    let mut meshed: HashSet<ChunkKey> = HashSet::new();
    for _ in 0..2000 {
        manager.update();
        for event in manager.drain_events() {
            if let MeshEvent::Updated { key, .. } = event {
                meshed.insert(key);
            }
        }
        if meshed.len() == 7 {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(meshed.len(), 7, "capped-out chunks never recovered");
}

#[test]
fn evicted_chunks_discard_in_flight_results() {
    let chunk_size = 8.0;
    let config = EngineConfig {
        resolution: 8,
        chunk_size,
        render_distance: 0.0,
        workers: 1,
        ..EngineConfig::default()
    };
    let mut manager = ChunkManager::new(config, Box::new(HalfSpaceSource { height: 4.0 }))
        .expect("manager construction");

    manager.set_focus(Vector3::new(0.0, 0.0, 0.0));
    manager.update(); // dispatch the job for (0,0,0)

    // Jump away immediately; whatever the worker produces for the old chunk
    // must be dropped, not surface as an event for a dead key.
    manager.set_focus(Vector3::new(100.0 * chunk_size, 0.0, 0.0));
    let old = ChunkKey::new(0, 0, 0);
    assert!(manager.chunk(old).is_none());

    assert!(pump_until(&mut manager, |event| {
        match event {
            MeshEvent::Updated { key, .. } => {
                assert_ne!(*key, old, "event for an evicted chunk");
                *key == ChunkKey::new(100, 0, 0)
            }
            MeshEvent::Removed { .. } => false,
        }
    }));
}
