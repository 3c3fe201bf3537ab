//! # Chunk Manager
//!
//! The single coordinating context of the engine. It owns the active chunk
//! set, streams chunks in and out around a focus point, queues and dispatches
//! mesh jobs, and applies completed geometry back to the owning chunks.
//!
//! ## Concurrency Model
//!
//! Only extraction runs on worker slots; every piece of state mutation —
//! chunk creation, eviction, queueing, dirty-region bookkeeping — happens
//! here, on whatever thread owns the manager. No locks are needed because
//! the only cross-context traffic is message passing of immutable job
//! payloads and result buffers. [`ChunkManager::set_focus`] and
//! [`ChunkManager::request_edit`] return immediately; meshing always happens
//! after the fact, asynchronously, driven by [`ChunkManager::update`].
//!
//! ## Ordering
//!
//! The job queue is FIFO. A chunk already in flight is never dispatched a
//! second time concurrently: an edit arriving mid-flight re-marks the chunk
//! dirty and a follow-up job is queued when the running one completes, so no
//! edit is ever silently dropped. An edit arriving while a job is still
//! queued refreshes that job's density snapshot in place — multiple edits
//! coalesce into a single pass.
//!
//! Every job carries the incarnation number of the chunk it was built from.
//! A chunk evicted mid-flight and re-created at the same key gets a fresh
//! incarnation, so when the dead incarnation's result eventually arrives it
//! is recognized and discarded instead of landing on the new chunk.

use cgmath::{Point3, Vector3};
use std::collections::{HashMap, VecDeque};

use crate::chunk::{Chunk, ChunkKey};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::field::DensitySource;
use crate::jobs::protocol::{MeshRequest, MeshResponse};
use crate::jobs::MeshWorkerPool;
use crate::meshing::mesh::MeshBuffers;
use crate::meshing::{tables, ExtractOptions};

/// A geometry change the external renderer must react to.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// A chunk has new geometry; the renderer should rebuild its drawable.
    Updated {
        /// The chunk that changed.
        key: ChunkKey,
        /// The freshly extracted buffers.
        mesh: MeshBuffers,
    },
    /// A chunk was evicted; the renderer should dispose its drawable.
    Removed {
        /// The chunk that went away.
        key: ChunkKey,
    },
}

/// Owns the active chunk set and coordinates streaming, editing, and
/// worker-driven meshing.
pub struct ChunkManager {
    config: EngineConfig,
    source: Box<dyn DensitySource>,
    pool: MeshWorkerPool,
    chunks: HashMap<ChunkKey, Chunk>,
    /// FIFO of chunk keys awaiting dispatch; `pending` holds their requests.
    queue: VecDeque<ChunkKey>,
    /// Queued requests by key. The snapshot inside is refreshed whenever an
    /// edit coalesces into an already-queued job.
    pending: HashMap<ChunkKey, MeshRequest>,
    /// Chunks currently bound to a busy worker slot, with the incarnation
    /// their running job was built from.
    in_flight: HashMap<ChunkKey, u64>,
    /// Incarnation number of each active chunk. Bumped on creation; a job
    /// result is applied only when its incarnation is still the live one.
    generations: HashMap<ChunkKey, u64>,
    next_generation: u64,
    events: Vec<MeshEvent>,
}

impl ChunkManager {
    /// Creates a manager with the given configuration and density producer.
    ///
    /// Validates the configuration and the embedded marching-cubes tables,
    /// and spawns the worker pool.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn DensitySource>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        tables::validate_tables()?;

        let pool = MeshWorkerPool::new(config.workers);

        Ok(ChunkManager {
            config,
            source,
            pool,
            chunks: HashMap::new(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            generations: HashMap::new(),
            next_generation: 0,
            events: Vec::new(),
        })
    }

    /// The configuration this manager runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of active chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of queued-but-undispatched mesh jobs.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Number of jobs currently bound to worker slots.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of worker slots.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// The active chunk at `key`, if streamed in.
    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    /// Keys of every active chunk, in no particular order.
    pub fn active_keys(&self) -> Vec<ChunkKey> {
        self.chunks.keys().copied().collect()
    }

    /// Moves the streaming focus, creating every chunk within the render
    /// distance and evicting every chunk outside it. Returns immediately;
    /// meshing for new chunks happens asynchronously.
    pub fn set_focus(&mut self, position: Vector3<f32>) {
        let focus = self.chunk_cell_of(position);
        let radius = self.config.render_distance;
        let reach = radius.ceil() as i32;

        // Stream in: every grid cell within the Euclidean radius.
        for dz in -reach..=reach {
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let distance_sq = (dx * dx + dy * dy + dz * dz) as f32;
                    if distance_sq > radius * radius {
                        continue;
                    }
                    let key = Point3::new(focus.x + dx, focus.y + dy, focus.z + dz);
                    if !self.chunks.contains_key(&key) {
                        self.create_chunk(key);
                    }
                }
            }
        }

        // Stream out: everything beyond the radius.
        let evicted: Vec<ChunkKey> = self
            .chunks
            .keys()
            .copied()
            .filter(|key| {
                let dx = (key.x - focus.x) as f32;
                let dy = (key.y - focus.y) as f32;
                let dz = (key.z - focus.z) as f32;
                dx * dx + dy * dy + dz * dz > radius * radius
            })
            .collect();
        for key in evicted {
            self.evict_chunk(key);
        }
    }

    /// Applies a brush edit to every active chunk the edit sphere can
    /// touch, queueing remesh jobs for the chunks actually modified.
    ///
    /// Returns whether any chunk changed. A position outside every active
    /// chunk is a no-op, not an error.
    pub fn request_edit(
        &mut self,
        position: Vector3<f32>,
        radius: f32,
        strength: f32,
        additive: bool,
    ) -> bool {
        if radius <= 0.0 {
            return false;
        }

        // Broad phase against chunk bounds rather than centers, so an edit
        // hugging a seam still reaches both neighbors.
        let candidates: Vec<ChunkKey> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.bounds().intersects_sphere(position, radius))
            .map(|(key, _)| *key)
            .collect();

        let mut modified_any = false;
        for key in candidates {
            let Some(chunk) = self.chunks.get_mut(&key) else {
                continue;
            };
            if chunk.apply_brush(position, radius, strength, additive) {
                modified_any = true;
                self.enqueue_remesh(key);
            }
        }

        if !modified_any {
            log::debug!(
                "edit at ({:.1}, {:.1}, {:.1}) touched no active chunk",
                position.x,
                position.y,
                position.z
            );
        }
        modified_any
    }

    /// Pumps the engine: applies completed jobs and dispatches queued ones.
    ///
    /// Call once per frame (or tick). Never blocks.
    pub fn update(&mut self) {
        self.apply_completed_jobs();
        self.requeue_stranded_chunks();
        self.dispatch_queued_jobs();
    }

    /// Drains the geometry events accumulated since the last call. The
    /// external renderer consumes these to build and dispose drawables.
    pub fn drain_events(&mut self) -> Vec<MeshEvent> {
        std::mem::take(&mut self.events)
    }

    /// The chunk-grid cell containing a world position.
    fn chunk_cell_of(&self, position: Vector3<f32>) -> ChunkKey {
        let size = self.config.chunk_size;
        Point3::new(
            (position.x / size).floor() as i32,
            (position.y / size).floor() as i32,
            (position.z / size).floor() as i32,
        )
    }

    /// Creates the chunk at `key` (density generated once) and queues its
    /// first mesh job.
    fn create_chunk(&mut self, key: ChunkKey) {
        let chunk = Chunk::new(
            key,
            self.config.resolution,
            self.config.chunk_size,
            self.source.as_ref(),
        );
        log::debug!("created chunk ({}, {}, {})", key.x, key.y, key.z);
        self.next_generation += 1;
        self.generations.insert(key, self.next_generation);
        self.chunks.insert(key, chunk);
        self.enqueue_remesh(key);
    }

    /// Removes the chunk at `key` from every map and queue, cancelling its
    /// queued job if it has one. An in-flight job cannot be cancelled; its
    /// result is discarded on completion instead.
    fn evict_chunk(&mut self, key: ChunkKey) {
        if self.pending.remove(&key).is_some() {
            self.queue.retain(|queued| *queued != key);
        }
        // Clearing the in-flight mark lets a chunk re-created at this key
        // queue its own first job; the running job's result still arrives
        // but fails the incarnation check.
        self.in_flight.remove(&key);
        self.generations.remove(&key);
        if let Some(mut chunk) = self.chunks.remove(&key) {
            chunk.dispose();
            self.events.push(MeshEvent::Removed { key });
            log::debug!("evicted chunk ({}, {}, {})", key.x, key.y, key.z);
        }
    }

    /// Queues a remesh for `key`, coalescing with any job already queued
    /// for the same chunk.
    fn enqueue_remesh(&mut self, key: ChunkKey) {
        if self.in_flight.contains_key(&key) {
            // The running job predates this edit. The chunk stays dirty, and
            // completion handling queues the follow-up pass.
            return;
        }

        let request = match self.build_request(key) {
            Some(request) => request,
            None => return,
        };

        if self.pending.insert(key, request).is_some() {
            // Already queued: the snapshot refresh above is the whole
            // coalesce — the queue keeps a single entry for this chunk.
            return;
        }

        self.queue.push_back(key);
        self.enforce_queue_cap();
    }

    /// Snapshots the chunk's current field into a job request and clears
    /// its dirty tracking; the snapshot now owns that state.
    fn build_request(&mut self, key: ChunkKey) -> Option<MeshRequest> {
        let generation = self.generations.get(&key).copied()?;
        let config = &self.config;
        let chunk = self.chunks.get_mut(&key)?;
        let bounds = chunk.bounds();
        let request = MeshRequest {
            key: [key.x, key.y, key.z],
            generation,
            density: chunk.snapshot(),
            resolution: chunk.resolution(),
            iso_level: config.iso_level,
            bounds_min: bounds.min.into(),
            bounds_max: bounds.max.into(),
            seamless: config.seamless,
            double_sided: config.double_sided,
            close_boundary: config.close_boundary,
        };
        chunk.clear_dirty();
        Some(request)
    }

    /// Applies the configured queue cap by dropping the oldest pending job.
    /// The dropped chunk is re-marked dirty so a later pass can pick it up.
    fn enforce_queue_cap(&mut self) {
        let Some(cap) = self.config.max_queued_jobs else {
            return;
        };
        while self.queue.len() > cap {
            let Some(dropped) = self.queue.pop_front() else {
                break;
            };
            self.pending.remove(&dropped);
            if let Some(chunk) = self.chunks.get_mut(&dropped) {
                // The dropped snapshot's edits live on in the dirty flag, so
                // a later pass can still pick the chunk up.
                chunk.mark_dirty();
            }
            log::warn!(
                "mesh job queue over cap ({cap}); dropped oldest job for chunk ({}, {}, {})",
                dropped.x,
                dropped.y,
                dropped.z
            );
        }
    }

    /// Installs finished geometry and frees worker slots. Results from an
    /// incarnation that is no longer live are discarded without touching
    /// whatever chunk currently holds the key.
    fn apply_completed_jobs(&mut self) {
        for response in self.pool.poll_completed() {
            let key = response.key();
            let generation = response.generation();

            if self.in_flight.get(&key) == Some(&generation) {
                self.in_flight.remove(&key);
            }
            if self.generations.get(&key) != Some(&generation) {
                // The chunk was evicted (and possibly re-created) while the
                // job ran.
                log::debug!(
                    "discarding mesh result for dead incarnation of chunk ({}, {}, {})",
                    key.x,
                    key.y,
                    key.z
                );
                continue;
            }

            match response {
                MeshResponse::Completed { mesh, .. } => {
                    if let Some(chunk) = self.chunks.get_mut(&key) {
                        chunk.install_mesh(mesh.clone());
                        self.events.push(MeshEvent::Updated { key, mesh });
                    }
                }
                MeshResponse::Failed { error, .. } => {
                    // Keep the last-good mesh; no automatic retry.
                    log::error!(
                        "mesh job for chunk ({}, {}, {}) failed: {error}",
                        key.x,
                        key.y,
                        key.z
                    );
                }
            }

            // An edit that landed mid-flight left the chunk dirty; it was
            // promised a follow-up pass.
            let needs_followup = self
                .chunks
                .get(&key)
                .map(|chunk| chunk.is_dirty())
                .unwrap_or(false);
            if needs_followup {
                self.enqueue_remesh(key);
            }
        }
    }

    /// Queues a remesh for every chunk left dirty with no queued or running
    /// job, such as one whose job fell off a capped queue. Keeps the
    /// guarantee that an applied edit always reaches a mesh pass.
    fn requeue_stranded_chunks(&mut self) {
        let stranded: Vec<ChunkKey> = self
            .chunks
            .iter()
            .filter(|(key, chunk)| {
                chunk.is_dirty()
                    && !self.pending.contains_key(key)
                    && !self.in_flight.contains_key(key)
            })
            .map(|(key, _)| *key)
            .collect();
        for key in stranded {
            self.enqueue_remesh(key);
        }
    }

    /// Hands queued jobs to idle slots, oldest first.
    fn dispatch_queued_jobs(&mut self) {
        while self.pool.has_idle_slot() {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            let Some(request) = self.pending.remove(&key) else {
                continue;
            };

            let generation = request.generation;
            match self.pool.try_dispatch(request) {
                Ok(()) => {
                    self.in_flight.insert(key, generation);
                }
                Err(request) => {
                    // Slot raced away or worker died; put the job back at
                    // the head so ordering is preserved.
                    self.pending.insert(key, request);
                    self.queue.push_front(key);
                    break;
                }
            }
        }
    }
}
