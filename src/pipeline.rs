//! Worker pools, work queues, and the stage barrier.
//!
//! Each pipeline stage (stretch/tilt, diffusion, advection, tracer
//! advection) owns a blocking MPMC work queue drained by a fixed pool of OS
//! threads. The orchestrator arms the shared barrier with the item count,
//! enqueues every item, and blocks until the pool reports the stage drained.
//! Stages never overlap, which is what makes the published octree snapshot
//! and the disjoint-index front-buffer writes race-free.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::buffer::VortonStore;
use crate::octree::VortonTree;
use crate::stages;
use crate::tracer::{self, FluidTracer};
use crate::vorton::Vorton;

/// Counts outstanding work items for the stage in flight and releases the
/// orchestrator when the count hits zero.
///
/// The release signal is a one-slot channel fan-in: the worker whose
/// decrement empties the counter sends exactly one token, and `wait`
/// receives exactly one token per armed stage. The wait blocks indefinitely;
/// a worker crashing mid-item would hang the orchestrator, which is a
/// documented design limitation rather than a handled fault.
pub(crate) struct StageBarrier {
    outstanding: AtomicUsize,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl StageBarrier {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(1);
        Self {
            outstanding: AtomicUsize::new(0),
            done_tx,
            done_rx,
        }
    }

    /// Set the number of items the next `wait` should cover. Must only be
    /// called with no stage in flight, and with `n > 0`.
    pub fn arm(&self, n: usize) {
        self.outstanding.store(n, Ordering::SeqCst);
    }

    /// Record one completed item. Called by workers.
    pub fn complete_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.done_tx.send(());
        }
    }

    /// Block until the armed count of completions has arrived.
    pub fn wait(&self) {
        let _ = self.done_rx.recv();
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// State shared between the orchestrator and every worker thread.
pub(crate) struct SimState {
    pub store: VortonStore,
    pub viscosity: f32,
    pub barrier: StageBarrier,
}

/// A pointer to a caller-owned tracer, handed to exactly one worker.
///
/// Sending `&mut` across persistent worker threads is not expressible with
/// scoped borrows, so tracer items carry a raw pointer instead. The
/// orchestrator keeps the exclusive borrow of the tracer slice alive and
/// blocks on the barrier until the stage drains, so the pointee outlives the
/// item and no two workers ever hold the same tracer.
pub(crate) struct TracerHandle(pub *mut FluidTracer);

// SAFETY: exclusive per-item ownership for the duration of the stage, see above.
unsafe impl Send for TracerHandle {}

/// One queued unit of work.
pub(crate) enum WorkItem {
    /// Stretch/tilt one vorton against the given tree snapshot.
    StretchTilt { id: u32, tree: Arc<VortonTree> },
    /// Advect one vorton against the given tree snapshot.
    Advect { id: u32, tree: Arc<VortonTree> },
    /// Diffuse vorticity within one octree-leaf group.
    Diffuse { group: Vec<u32> },
    /// Advect one caller-owned tracer point.
    Tracer {
        tracer: TracerHandle,
        tree: Arc<VortonTree>,
        tpf: f32,
    },
    /// Cooperative cancellation: the receiving worker exits its loop.
    Shutdown,
}

fn worker_loop(state: Arc<SimState>, queue: Receiver<WorkItem>) {
    // Reusable influence scratch so the per-item hot path does not allocate.
    let mut scratch: Vec<Vorton> = Vec::new();
    loop {
        let item = match queue.recv() {
            Ok(item) => item,
            // All senders dropped: the simulation is being torn down.
            Err(_) => break,
        };
        match item {
            WorkItem::StretchTilt { id, tree } => {
                stages::stretch_and_tilt_vorton(&state.store, &tree, id, &mut scratch);
            }
            WorkItem::Advect { id, tree } => {
                stages::advect_vorton(&state.store, &tree, id, &mut scratch);
            }
            WorkItem::Diffuse { group } => {
                stages::diffuse_group(&state.store, &group, state.viscosity);
            }
            WorkItem::Tracer { tracer, tree, tpf } => {
                // SAFETY: the orchestrator holds `&mut [FluidTracer]` across
                // the whole stage and each tracer is enqueued exactly once.
                let tracer = unsafe { &mut *tracer.0 };
                scratch.clear();
                tree.influential_vortons(tracer.position, None, &mut scratch);
                tracer::advect_tracer(tracer, &scratch, tpf);
            }
            WorkItem::Shutdown => break,
        }
        state.barrier.complete_one();
    }
    log::debug!("worker {:?} exiting", thread::current().name());
}

/// A fixed pool of worker threads draining one stage's queue.
pub(crate) struct WorkerPool {
    name: &'static str,
    tx: Sender<WorkItem>,
    rx: Receiver<WorkItem>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = unbounded();
        Self {
            name,
            tx,
            rx,
            handles: Vec::new(),
        }
    }

    /// Spawn `n` more workers for this stage.
    pub fn spawn_workers(&mut self, n: usize, state: &Arc<SimState>) {
        for _ in 0..n {
            let state = Arc::clone(state);
            let rx = self.rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.name, self.handles.len()))
                .spawn(move || worker_loop(state, rx))
                .expect("failed to spawn simulation worker thread");
            self.handles.push(handle);
        }
    }

    /// Number of live workers in this pool.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Enqueue one work item.
    pub fn send(&self, item: WorkItem) {
        let _ = self.tx.send(item);
    }

    /// Interrupt every worker and join it. A stopped pool must be
    /// re-spawned before further dispatching.
    pub fn stop(&mut self) {
        for _ in 0..self.handles.len() {
            let _ = self.tx.send(WorkItem::Shutdown);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// The four per-stage pools.
pub(crate) struct StagePools {
    pub stretch: WorkerPool,
    pub diffuse: WorkerPool,
    pub advect: WorkerPool,
    pub tracer: WorkerPool,
}

impl StagePools {
    pub fn new() -> Self {
        Self {
            stretch: WorkerPool::new("stretch-tilt"),
            diffuse: WorkerPool::new("diffuse"),
            advect: WorkerPool::new("vorton-advect"),
            tracer: WorkerPool::new("tracer-advect"),
        }
    }

    pub fn spawn_workers(&mut self, per_stage: usize, state: &Arc<SimState>) {
        self.stretch.spawn_workers(per_stage, state);
        self.diffuse.spawn_workers(per_stage, state);
        self.advect.spawn_workers(per_stage, state);
        self.tracer.spawn_workers(per_stage, state);
    }

    pub fn stop_all(&mut self) {
        self.stretch.stop();
        self.diffuse.stop();
        self.advect.stop();
        self.tracer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_releases_after_exact_count() {
        let barrier = Arc::new(StageBarrier::new());
        barrier.arm(100);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    for _ in 0..25 {
                        barrier.complete_one();
                    }
                })
            })
            .collect();

        barrier.wait();
        assert_eq!(barrier.remaining(), 0);
        for w in workers {
            w.join().expect("barrier worker panicked");
        }
    }

    #[test]
    fn test_barrier_random_interleavings() {
        // The release must fire exactly once regardless of which worker
        // performs the final decrement, so hammer it across reuses.
        let barrier = Arc::new(StageBarrier::new());
        for round in 0..50 {
            let n = 1 + (round * 7) % 23;
            barrier.arm(n);
            let split = n / 2;

            let a = {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    for _ in 0..split {
                        barrier.complete_one();
                    }
                })
            };
            let b = {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    for _ in 0..(n - split) {
                        barrier.complete_one();
                    }
                })
            };

            barrier.wait();
            assert_eq!(barrier.remaining(), 0, "round {} left work behind", round);
            a.join().expect("worker a panicked");
            b.join().expect("worker b panicked");
        }
    }

    #[test]
    fn test_pool_drains_diffuse_items() {
        let state = Arc::new(SimState {
            store: VortonStore::new(8),
            viscosity: 0.5,
            barrier: StageBarrier::new(),
        });
        let mut pool = WorkerPool::new("test-diffuse");
        pool.spawn_workers(3, &state);

        state.barrier.arm(8);
        for id in 0..8u32 {
            pool.send(WorkItem::Diffuse { group: vec![id] });
        }
        state.barrier.wait();
        assert_eq!(state.barrier.remaining(), 0);

        pool.stop();
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_stop_then_respawn() {
        let state = Arc::new(SimState {
            store: VortonStore::new(1),
            viscosity: 0.0,
            barrier: StageBarrier::new(),
        });
        let mut pool = WorkerPool::new("test-respawn");
        pool.spawn_workers(2, &state);
        pool.stop();
        assert_eq!(pool.worker_count(), 0);

        pool.spawn_workers(1, &state);
        state.barrier.arm(1);
        pool.send(WorkItem::Diffuse { group: vec![0] });
        state.barrier.wait();
        pool.stop();
    }
}
