//! PipelineCoordinator - wires ingestion, assembler and stages together
//!
//! ```text
//! inertial source ─▶ InertialSampleBuffer ─┐
//! camera source ──▶ [frames] ──────────────┴▶ assembler ─▶ [frontend] ─▶ frontend ─▶ [backend] ─▶ backend
//! pose source ────▶ TemporalBuffer<PoseReference> (read by stages)
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use contracts::{
    FrameDrop, FrameSource, InertialSource, PipelineConfig, PoseReference, PoseSource,
    StereoFrame, SynchronizedPacket,
};
use ingestion::{IngestionError, IngestionHandle, IngestionPipeline, MetricsSnapshot};
use observability::MetricsSummary;
use parking_lot::{Condvar, Mutex};
use sync_engine::{
    AssemblerMetrics, AssemblerReport, AssemblerStats, BlockingQueue, InertialBufferStats,
    InertialSampleBuffer, SyncAssembler, TemporalBuffer,
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::CoordinatorError;
use crate::handle::StageHandle;
use crate::metrics::{StageMetrics, StageStats};
use crate::stage::{BackendStage, FrontendStage};

/// Frame drops kept for the run report
const RECENT_DROPS: usize = 32;

/// Pipeline lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not started
    Idle,
    Running,
    /// Shutdown or drain in progress
    Stopping,
    Stopped,
}

/// Sensor sources handed to [`PipelineCoordinator::start`]
pub struct PipelineSources {
    pub inertial: Box<dyn InertialSource>,
    pub frames: Box<dyn FrameSource>,
    pub poses: Option<Box<dyn PoseSource>>,
}

/// Type-erased queue control, lets the coordinator close queues of any item type
trait QueueControl: Send + Sync {
    fn shutdown(&self);
    fn len(&self) -> usize;
}

impl<T: Send> QueueControl for BlockingQueue<T> {
    fn shutdown(&self) {
        BlockingQueue::shutdown(self)
    }

    fn len(&self) -> usize {
        BlockingQueue::len(self)
    }
}

enum Worker {
    Ingestion(IngestionHandle),
    Assembler(JoinHandle<AssemblerReport>),
    Frontend(StageHandle),
    Backend(StageHandle),
}

impl Worker {
    fn thread_id(&self) -> ThreadId {
        match self {
            Worker::Ingestion(handle) => handle.thread_id(),
            Worker::Assembler(handle) => handle.thread().id(),
            Worker::Frontend(handle) | Worker::Backend(handle) => handle.thread_id(),
        }
    }

    /// Position in the chain, sensor-facing first
    fn rank(&self) -> u8 {
        match self {
            Worker::Ingestion(_) => 0,
            Worker::Assembler(_) => 1,
            Worker::Frontend(_) => 2,
            Worker::Backend(_) => 3,
        }
    }
}

struct Lifecycle {
    phase: Phase,
    workers: Vec<Worker>,
    worker_ids: HashSet<ThreadId>,
    /// Workers that stopped the pipeline from their own thread, joined by
    /// the next stop call made from outside the pipeline
    parked: Vec<Worker>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    assembler_summary: Option<MetricsSummary>,
    stream_errors: Vec<String>,
}

struct StageMetricsSet {
    assembler: Option<Arc<AssemblerMetrics>>,
    frontend: Option<Arc<StageMetrics>>,
    backend: Option<Arc<StageMetrics>>,
}

/// State shared with worker threads and shutdown handles
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    phase_changed: Condvar,
    /// Set once the backend worker has exited
    completed: Mutex<bool>,
    completion: Condvar,
    ingestion: IngestionPipeline,
    inertial: Arc<InertialSampleBuffer>,
    /// Queues in chain order: frames, frontend, backend
    queues: Mutex<Vec<Arc<dyn QueueControl>>>,
    stage_metrics: Mutex<StageMetricsSet>,
    recent_drops: Mutex<VecDeque<FrameDrop>>,
    fatal_error: Mutex<Option<String>>,
    shutdown_on_fatal: bool,
}

impl Shared {
    /// Enter `Stopping` and take the worker handles.
    ///
    /// Returns `None` when another caller already owns the stop; in that case
    /// non-worker threads block until the pipeline is `Stopped` and then join
    /// any parked worker.
    fn begin_stop(&self) -> Option<Vec<Worker>> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.phase {
            Phase::Idle => {
                lifecycle.phase = Phase::Stopped;
                self.phase_changed.notify_all();
                None
            }
            Phase::Running => {
                lifecycle.phase = Phase::Stopping;
                self.phase_changed.notify_all();
                Some(std::mem::take(&mut lifecycle.workers))
            }
            Phase::Stopping | Phase::Stopped => {
                if lifecycle.worker_ids.contains(&thread::current().id()) {
                    return None;
                }
                while lifecycle.phase != Phase::Stopped {
                    self.phase_changed.wait(&mut lifecycle);
                }
                let parked = std::mem::take(&mut lifecycle.parked);
                drop(lifecycle);
                for worker in parked {
                    self.join_worker(worker);
                }
                None
            }
        }
    }

    fn finish_stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.phase = Phase::Stopped;
        lifecycle.stopped_at = Some(Instant::now());
        self.phase_changed.notify_all();
        drop(lifecycle);
        self.mark_completed();
    }

    fn mark_completed(&self) {
        *self.completed.lock() = true;
        self.completion.notify_all();
    }

    /// Join `worker`, or park it when it is the calling thread
    fn join_worker(&self, worker: Worker) {
        if worker.thread_id() == thread::current().id() {
            debug!(rank = worker.rank(), "Stop requested from a worker, parking its handle");
            self.lifecycle.lock().parked.push(worker);
            return;
        }

        match worker {
            Worker::Ingestion(handle) => {
                let sensor_id = handle.sensor_id().to_string();
                match handle.join() {
                    Ok(count) => debug!(sensor_id = %sensor_id, count, "Ingestion thread joined"),
                    Err(e) => {
                        warn!(sensor_id = %sensor_id, error = %e, "Ingestion thread ended with error");
                        self.lifecycle.lock().stream_errors.push(e.to_string());
                    }
                }
            }
            Worker::Assembler(handle) => match handle.join() {
                Ok(report) => {
                    self.lifecycle.lock().assembler_summary = Some(report.summary);
                }
                Err(_) => error!("Assembler thread panicked"),
            },
            Worker::Frontend(handle) | Worker::Backend(handle) => {
                handle.join();
            }
        }
    }

    /// Shut every queue down, backend first, sensor-facing last, then join
    /// all workers.
    fn request_shutdown(&self) {
        let Some(workers) = self.begin_stop() else {
            return;
        };
        info!(workers = workers.len(), "Pipeline shutdown requested");

        self.ingestion.stop_all();
        for queue in self.queues.lock().iter().rev() {
            queue.shutdown();
        }
        self.inertial.notify_waiters();

        for worker in workers {
            self.join_worker(worker);
        }

        self.finish_stop();
        info!("Pipeline stopped");
    }

    /// Stop sources, then close and join each link upstream first so every
    /// accepted frame makes it through the chain.
    fn drain(&self) {
        let Some(mut workers) = self.begin_stop() else {
            return;
        };
        info!(workers = workers.len(), "Draining pipeline");

        self.ingestion.stop_all();
        let queues: Vec<_> = self.queues.lock().clone();
        workers.sort_by_key(Worker::rank);

        let mut pending = workers.into_iter().peekable();
        for rank in 0..=3u8 {
            // Queue feeding the stage at `rank` (frames feeds the assembler)
            if rank >= 1 {
                if let Some(queue) = queues.get(rank as usize - 1) {
                    debug!(rank, remaining = queue.len(), "Closing queue");
                    queue.shutdown();
                }
            }
            if rank == 1 {
                self.inertial.notify_waiters();
            }
            while let Some(worker) = pending.next_if(|w| w.rank() == rank) {
                self.join_worker(worker);
            }
        }

        self.finish_stop();
        info!("Pipeline drained");
    }

    fn on_fatal(&self, err: &IngestionError) {
        error!(error = %err, "Fatal sensor contract violation");
        *self.fatal_error.lock() = Some(err.to_string());
        if self.shutdown_on_fatal {
            self.request_shutdown();
        }
    }

    fn record_drop(&self, drop: &FrameDrop) {
        let mut drops = self.recent_drops.lock();
        if drops.len() == RECENT_DROPS {
            drops.pop_front();
        }
        drops.push_back(*drop);
    }
}

/// Cloneable handle that can stop the pipeline from any thread
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Weak<Shared>,
}

impl ShutdownHandle {
    /// Same as [`PipelineCoordinator::request_shutdown`]. No-op once the
    /// coordinator is gone.
    pub fn request_shutdown(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.request_shutdown();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.shared
            .upgrade()
            .is_none_or(|shared| matches!(shared.lifecycle.lock().phase, Phase::Stopping | Phase::Stopped))
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Owns the queues, buffers and worker threads of the sync pipeline
pub struct PipelineCoordinator {
    config: PipelineConfig,
    inertial: Arc<InertialSampleBuffer>,
    reference_poses: Arc<TemporalBuffer<PoseReference>>,
    frames: Arc<BlockingQueue<StereoFrame>>,
    packets: Arc<BlockingQueue<SynchronizedPacket>>,
    shared: Arc<Shared>,
}

impl PipelineCoordinator {
    /// Build queues and buffers from `config`. Nothing runs until [`start`](Self::start).
    pub fn new(config: PipelineConfig) -> Self {
        let inertial = Arc::new(InertialSampleBuffer::new());
        let reference_poses = Arc::new(TemporalBuffer::from_config(&config.reference_buffer));
        let frames = Arc::new(BlockingQueue::from_capacity("frames", config.queues.frames));
        let packets = Arc::new(BlockingQueue::from_capacity("frontend", config.queues.frontend));

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            Shared {
                lifecycle: Mutex::new(Lifecycle {
                    phase: Phase::Idle,
                    workers: Vec::new(),
                    worker_ids: HashSet::new(),
                    parked: Vec::new(),
                    started_at: None,
                    stopped_at: None,
                    assembler_summary: None,
                    stream_errors: Vec::new(),
                }),
                phase_changed: Condvar::new(),
                completed: Mutex::new(false),
                completion: Condvar::new(),
                ingestion: IngestionPipeline::new().with_fatal_hook(move |err| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_fatal(err);
                    }
                }),
                inertial: Arc::clone(&inertial),
                queues: Mutex::new(vec![
                    Arc::clone(&frames) as Arc<dyn QueueControl>,
                    Arc::clone(&packets) as Arc<dyn QueueControl>,
                ]),
                stage_metrics: Mutex::new(StageMetricsSet {
                    assembler: None,
                    frontend: None,
                    backend: None,
                }),
                recent_drops: Mutex::new(VecDeque::with_capacity(RECENT_DROPS)),
                fatal_error: Mutex::new(None),
                shutdown_on_fatal: config.shutdown.on_fatal,
            }
        });

        Self {
            config,
            inertial,
            reference_poses,
            frames,
            packets,
            shared,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reference pose buffer, for stages that compare against ground truth
    pub fn reference_poses(&self) -> Arc<TemporalBuffer<PoseReference>> {
        Arc::clone(&self.reference_poses)
    }

    pub fn inertial_buffer(&self) -> Arc<InertialSampleBuffer> {
        Arc::clone(&self.inertial)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lifecycle.lock().phase
    }

    /// Launch every worker thread: stages first, then the assembler, then
    /// ingestion, so nothing produces into a queue without a consumer.
    #[instrument(name = "coordinator_start", skip_all)]
    pub fn start<F, B>(
        &self,
        sources: PipelineSources,
        frontend: F,
        backend: B,
    ) -> Result<(), CoordinatorError>
    where
        F: FrontendStage,
        B: BackendStage<F::Output>,
    {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.phase != Phase::Idle {
            return Err(CoordinatorError::AlreadyStarted);
        }
        lifecycle.phase = Phase::Running;
        lifecycle.started_at = Some(Instant::now());

        let result = self.spawn_workers(&mut lifecycle, sources, frontend, backend);
        drop(lifecycle);

        match result {
            Ok(()) => {
                info!(
                    frames_queue = ?self.config.queues.frames,
                    frontend_queue = ?self.config.queues.frontend,
                    backend_queue = ?self.config.queues.backend,
                    max_inertial_wait_ms = self.config.sync.max_inertial_wait_ms,
                    "Pipeline started"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Pipeline start failed, stopping started workers");
                self.shared.request_shutdown();
                Err(e)
            }
        }
    }

    fn spawn_workers<F, B>(
        &self,
        lifecycle: &mut Lifecycle,
        sources: PipelineSources,
        frontend: F,
        backend: B,
    ) -> Result<(), CoordinatorError>
    where
        F: FrontendStage,
        B: BackendStage<F::Output>,
    {
        let backend_queue: Arc<BlockingQueue<F::Output>> =
            Arc::new(BlockingQueue::from_capacity("backend", self.config.queues.backend));
        self.shared
            .queues
            .lock()
            .push(Arc::clone(&backend_queue) as Arc<dyn QueueControl>);

        let register = |lifecycle: &mut Lifecycle, worker: Worker| {
            lifecycle.worker_ids.insert(worker.thread_id());
            lifecycle.workers.push(worker);
        };

        // Backend
        let weak = Arc::downgrade(&self.shared);
        let handle = StageHandle::spawn_backend(backend, Arc::clone(&backend_queue), move || {
            if let Some(shared) = weak.upgrade() {
                shared.mark_completed();
            }
        })?;
        self.shared.stage_metrics.lock().backend = Some(Arc::clone(handle.metrics()));
        register(lifecycle, Worker::Backend(handle));

        // Frontend
        let handle = StageHandle::spawn_frontend(frontend, Arc::clone(&self.packets), backend_queue)?;
        self.shared.stage_metrics.lock().frontend = Some(Arc::clone(handle.metrics()));
        register(lifecycle, Worker::Frontend(handle));

        // Assembler
        let weak = Arc::downgrade(&self.shared);
        let mut assembler = SyncAssembler::new(
            self.config.sync.clone(),
            Arc::clone(&self.inertial),
            Arc::clone(&self.packets),
        )
        .with_drop_listener(move |drop| {
            if let Some(shared) = weak.upgrade() {
                shared.record_drop(drop);
            }
        });
        self.shared.stage_metrics.lock().assembler = Some(assembler.metrics());
        let frames = Arc::clone(&self.frames);
        let packets = Arc::clone(&self.packets);
        let handle = thread::Builder::new()
            .name("assembler".to_string())
            .spawn(move || {
                let report = assembler.run(&frames);
                packets.shutdown();
                report
            })
            .map_err(|e| CoordinatorError::spawn("assembler", e))?;
        register(lifecycle, Worker::Assembler(handle));

        // Ingestion
        let ingestion = &self.shared.ingestion;
        if let Some(poses) = sources.poses {
            let handle = ingestion.spawn_pose(poses, Arc::clone(&self.reference_poses))?;
            register(lifecycle, Worker::Ingestion(handle));
        }
        let handle = ingestion.spawn_camera(sources.frames, Arc::clone(&self.frames))?;
        register(lifecycle, Worker::Ingestion(handle));
        let handle = ingestion.spawn_inertial(sources.inertial, Arc::clone(&self.inertial))?;
        register(lifecycle, Worker::Ingestion(handle));

        Ok(())
    }

    /// Stop the pipeline now.
    ///
    /// Shuts every queue down in downstream order (sensor-facing queue last),
    /// so items already queued keep draining while no new frames are
    /// accepted, then joins all threads. Idempotent and callable from any
    /// thread, including a worker's error handler; callers other than workers
    /// return only once the pipeline is stopped. A worker that stops the
    /// pipeline is not joined by itself: the next call from outside the
    /// pipeline (or dropping the coordinator) joins it.
    pub fn request_shutdown(&self) {
        self.shared.request_shutdown();
    }

    /// Stop the sources and let everything already accepted flow through the
    /// chain before joining.
    pub fn drain(&self) {
        self.shared.drain();
    }

    /// Block until the backend has processed its last item (all sources
    /// ended) or the pipeline stopped. Returns false on timeout.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut completed = self.shared.completed.lock();
        while !*completed {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .completion
                        .wait_until(&mut completed, deadline)
                        .timed_out()
                    {
                        return *completed;
                    }
                }
                None => self.shared.completion.wait(&mut completed),
            }
        }
        true
    }

    /// Snapshot of every counter in the pipeline
    pub fn report(&self) -> PipelineReport {
        let lifecycle = self.shared.lifecycle.lock();
        let metrics = self.shared.stage_metrics.lock();
        let elapsed = match (lifecycle.started_at, lifecycle.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        PipelineReport {
            phase: lifecycle.phase,
            elapsed,
            ingestion: self.shared.ingestion.metrics().snapshot(),
            inertial_buffer: self.inertial.stats(),
            reference_poses: self.reference_poses.len(),
            assembler: metrics
                .assembler
                .as_ref()
                .map(|m| m.snapshot())
                .unwrap_or_default(),
            assembler_summary: lifecycle.assembler_summary.clone(),
            frontend: metrics.frontend.as_ref().map(|m| m.snapshot()),
            backend: metrics.backend.as_ref().map(|m| m.snapshot()),
            recent_drops: self.shared.recent_drops.lock().iter().copied().collect(),
            stream_errors: lifecycle.stream_errors.clone(),
            fatal_error: self.shared.fatal_error.lock().clone(),
        }
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        // Also joins a worker that stopped the pipeline itself
        if !matches!(self.phase(), Phase::Idle) {
            self.request_shutdown();
        }
    }
}

/// Pipeline run report
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub phase: Phase,
    pub elapsed: Duration,
    pub ingestion: MetricsSnapshot,
    pub inertial_buffer: InertialBufferStats,
    pub reference_poses: usize,
    pub assembler: AssemblerStats,
    /// Available once the assembler thread has been joined
    pub assembler_summary: Option<MetricsSummary>,
    pub frontend: Option<StageStats>,
    pub backend: Option<StageStats>,
    /// Most recent frame drops, oldest first
    pub recent_drops: Vec<FrameDrop>,
    pub stream_errors: Vec<String>,
    pub fatal_error: Option<String>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pipeline Report ({:?}) ===", self.phase)?;
        writeln!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "Ingested: {} inertial samples, {} frames, {} poses ({} rejected)",
            self.ingestion.samples_received,
            self.ingestion.frames_received,
            self.ingestion.poses_received,
            self.ingestion.rejected
        )?;
        writeln!(
            f,
            "Assembler: {} frames, {} dispatched, {} dropped, {} retries",
            self.assembler.frames_received,
            self.assembler.packets_dispatched,
            self.assembler.frames_dropped(),
            self.assembler.coverage_retries
        )?;
        if let Some(frontend) = &self.frontend {
            writeln!(
                f,
                "Frontend: {} processed, {} failed, {:.3} ms mean",
                frontend.processed, frontend.failures, frontend.mean_latency_ms
            )?;
        }
        if let Some(backend) = &self.backend {
            writeln!(
                f,
                "Backend: {} processed, {} failed, {:.3} ms mean",
                backend.processed, backend.failures, backend.mean_latency_ms
            )?;
        }
        writeln!(
            f,
            "Inertial buffer: {} retained, {} purged",
            self.inertial_buffer.len, self.inertial_buffer.purged_total
        )?;
        if let Some(summary) = &self.assembler_summary {
            write!(f, "{}", summary)?;
        }
        if let Some(fatal) = &self.fatal_error {
            writeln!(f, "Fatal: {}", fatal)?;
        }
        Ok(())
    }
}
