//! # Mesh Worker Pool
//!
//! A bounded pool of worker threads that run isosurface extraction off the
//! coordinating context. Each slot owns a dedicated request channel, a
//! response channel, and the worker's join handle; a slot is either idle or
//! bound to exactly one in-flight job.
//!
//! The pool never shares mutable state with its workers: a job travels as an
//! immutable [`MeshRequest`] payload, the answer comes back as a
//! [`MeshResponse`] buffer. Dispatch and completion polling are both
//! non-blocking, so the coordinator can pump the pool from an update loop
//! without ever stalling.
//!
//! A stalled worker only throttles its own slot's throughput; correctness
//! never depends on a slot finishing.

pub mod protocol;

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use protocol::{MeshRequest, MeshResponse};

use crate::meshing::{extract, Bounds, ExtractOptions};
use cgmath::Vector3;

/// Maximum number of jobs bound to one slot at a time.
///
/// Kept at 1 so a slot is a simple idle/busy binary and job results come
/// back in dispatch order per slot.
pub const MAX_JOBS_IN_FLIGHT: usize = 1;

/// One worker slot: its channels, in-flight count, and the thread handle
/// kept alive by the struct.
struct WorkerSlot {
    request_sender: Sender<MeshRequest>,
    response_receiver: Receiver<MeshResponse>,
    jobs_in_flight: usize,
    _worker: JoinHandle<()>,
}

/// A bounded set of mesh workers with round-robin dispatch.
pub struct MeshWorkerPool {
    slots: Vec<WorkerSlot>,
    next_slot: usize,
}

impl MeshWorkerPool {
    /// Spawns `workers` worker threads. Zero is allowed; such a pool never
    /// accepts a job, which keeps single-threaded tests deterministic.
    pub fn new(workers: usize) -> Self {
        let mut slots = Vec::with_capacity(workers);

        for index in 0..workers {
            let (request_sender, request_receiver) = channel::<MeshRequest>();
            let (response_sender, response_receiver) = channel::<MeshResponse>();

            let worker = thread::Builder::new()
                .name(format!("mesh-worker-{index}"))
                .spawn(move || {
                    while let Ok(request) = request_receiver.recv() {
                        let response = run_job(request);
                        if response_sender.send(response).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn mesh worker thread");

            slots.push(WorkerSlot {
                request_sender,
                response_receiver,
                jobs_in_flight: 0,
                _worker: worker,
            });
        }

        log::info!("mesh worker pool started with {workers} slot(s)");

        MeshWorkerPool {
            slots,
            next_slot: 0,
        }
    }

    /// Number of worker slots.
    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether at least one slot can accept a job right now.
    pub fn has_idle_slot(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.jobs_in_flight < MAX_JOBS_IN_FLIGHT)
    }

    /// Finds the next idle slot, round-robin from the last dispatch so load
    /// spreads evenly across workers.
    fn find_available_slot(&self) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let count = self.slots.len();
        (0..count)
            .map(|offset| (self.next_slot + offset) % count)
            .find(|&index| self.slots[index].jobs_in_flight < MAX_JOBS_IN_FLIGHT)
    }

    /// Hands a job to an idle slot.
    ///
    /// Returns the request back to the caller when every slot is busy or the
    /// chosen worker has disconnected, so the coordinator can requeue it.
    pub fn try_dispatch(&mut self, request: MeshRequest) -> Result<(), MeshRequest> {
        let Some(index) = self.find_available_slot() else {
            return Err(request);
        };

        match self.slots[index].request_sender.send(request) {
            Ok(()) => {
                self.slots[index].jobs_in_flight += 1;
                self.next_slot = (index + 1) % self.slots.len();
                Ok(())
            }
            Err(send_error) => {
                log::error!("mesh worker {index} disconnected; requeueing job");
                Err(send_error.0)
            }
        }
    }

    /// Collects every response that has arrived since the last poll,
    /// freeing the slots that produced them. Never blocks.
    pub fn poll_completed(&mut self) -> Vec<MeshResponse> {
        let mut responses = Vec::new();
        for slot in &mut self.slots {
            while let Ok(response) = slot.response_receiver.try_recv() {
                slot.jobs_in_flight -= 1;
                responses.push(response);
            }
        }
        responses
    }
}

/// Executes one mesh job. Runs on a worker thread.
///
/// The only failure the job itself can detect is a malformed snapshot;
/// extraction proper substitutes bad samples and never fails.
fn run_job(request: MeshRequest) -> MeshResponse {
    let expected = request.resolution * request.resolution * request.resolution;
    if request.resolution < 2 || request.density.len() != expected {
        return MeshResponse::Failed {
            key: request.key,
            generation: request.generation,
            error: format!(
                "density snapshot of length {} does not match resolution {}",
                request.density.len(),
                request.resolution
            ),
        };
    }

    let bounds = Bounds {
        min: Vector3::from(request.bounds_min),
        max: Vector3::from(request.bounds_max),
    };
    let options = ExtractOptions {
        seamless: request.seamless,
        double_sided: request.double_sided,
        close_boundary: request.close_boundary,
    };

    let mesh = extract(
        &request.density,
        [request.resolution; 3],
        request.iso_level,
        bounds,
        &options,
    );

    MeshResponse::Completed {
        key: request.key,
        generation: request.generation,
        mesh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(density: Vec<f32>, resolution: usize) -> MeshRequest {
        MeshRequest {
            key: [1, 2, 3],
            generation: 1,
            density,
            resolution,
            iso_level: 0.0,
            bounds_min: [0.0; 3],
            bounds_max: [1.0; 3],
            seamless: true,
            double_sided: false,
            close_boundary: false,
        }
    }

    #[test]
    fn malformed_snapshot_yields_tagged_error() {
        let response = run_job(request_with(vec![0.0; 5], 4));
        match response {
            MeshResponse::Failed { key, generation, error } => {
                assert_eq!(key, [1, 2, 3]);
                assert_eq!(generation, 1);
                assert!(error.contains("does not match resolution"));
            }
            MeshResponse::Completed { .. } => panic!("expected a failure response"),
        }
    }

    #[test]
    fn zero_worker_pool_never_accepts_jobs() {
        let mut pool = MeshWorkerPool::new(0);
        assert!(!pool.has_idle_slot());
        assert!(pool.try_dispatch(request_with(vec![1.0; 8], 2)).is_err());
        assert!(pool.poll_completed().is_empty());
    }

    #[test]
    fn dispatch_and_poll_round_trip() {
        let mut pool = MeshWorkerPool::new(1);
        // Constant positive field: completes with zero triangles.
        pool.try_dispatch(request_with(vec![1.0; 8], 2)).unwrap();
        assert!(!pool.has_idle_slot());

        let response = loop {
            let mut responses = pool.poll_completed();
            if let Some(response) = responses.pop() {
                break response;
            }
            thread::yield_now();
        };

        match response {
            MeshResponse::Completed { key, mesh, .. } => {
                assert_eq!(key, [1, 2, 3]);
                assert!(mesh.is_empty());
            }
            MeshResponse::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
        assert!(pool.has_idle_slot());
    }
}
