//! StageHandle - runs a stage on its own thread between two queues

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use contracts::SynchronizedPacket;
use sync_engine::BlockingQueue;
use tracing::{debug, error, instrument};

use crate::error::CoordinatorError;
use crate::metrics::{StageMetrics, StageStats};
use crate::stage::{BackendStage, FrontendStage};

/// Handle to a running stage worker
pub struct StageHandle {
    /// Stage name
    name: String,
    /// Shared metrics
    metrics: Arc<StageMetrics>,
    /// Worker thread handle
    worker_handle: JoinHandle<()>,
}

impl StageHandle {
    /// Spawn a frontend worker.
    ///
    /// The worker closes `output` when it exits so the backend drains and stops.
    pub fn spawn_frontend<F: FrontendStage>(
        stage: F,
        input: Arc<BlockingQueue<SynchronizedPacket>>,
        output: Arc<BlockingQueue<F::Output>>,
    ) -> Result<Self, CoordinatorError> {
        let name = stage.name().to_string();
        let metrics = Arc::new(StageMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = thread::Builder::new()
            .name(format!("stage-{}", name))
            .spawn(move || {
                frontend_worker(stage, &input, &output, &worker_metrics, &worker_name);
                output.shutdown();
            })
            .map_err(|e| CoordinatorError::spawn(&name, e))?;

        Ok(Self {
            name,
            metrics,
            worker_handle,
        })
    }

    /// Spawn a backend worker. `on_exit` runs on the worker thread after the
    /// stage finished.
    pub fn spawn_backend<I, B>(
        stage: B,
        input: Arc<BlockingQueue<I>>,
        on_exit: impl FnOnce() + Send + 'static,
    ) -> Result<Self, CoordinatorError>
    where
        I: Send + 'static,
        B: BackendStage<I>,
    {
        let name = stage.name().to_string();
        let metrics = Arc::new(StageMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = thread::Builder::new()
            .name(format!("stage-{}", name))
            .spawn(move || {
                backend_worker(stage, &input, &worker_metrics, &worker_name);
                on_exit();
            })
            .map_err(|e| CoordinatorError::spawn(&name, e))?;

        Ok(Self {
            name,
            metrics,
            worker_handle,
        })
    }

    /// Get stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<StageMetrics> {
        &self.metrics
    }

    pub fn thread_id(&self) -> ThreadId {
        self.worker_handle.thread().id()
    }

    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Wait for the worker to exit
    #[instrument(name = "stage_handle_join", skip(self), fields(stage = %self.name))]
    pub fn join(self) -> StageStats {
        if self.worker_handle.join().is_err() {
            error!(stage = %self.name, "Stage worker panicked");
        }
        debug!(stage = %self.name, "Stage worker joined");
        self.metrics.snapshot()
    }
}

fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}

/// Worker loop that feeds packets through the frontend
#[instrument(
    name = "frontend_worker_loop",
    skip(stage, input, output, metrics),
    fields(stage = %name)
)]
fn frontend_worker<F: FrontendStage>(
    mut stage: F,
    input: &BlockingQueue<SynchronizedPacket>,
    output: &BlockingQueue<F::Output>,
    metrics: &StageMetrics,
    name: &str,
) {
    debug!(stage = %name, "Frontend worker started");

    while let Ok(packet) = input.pop() {
        metrics.set_queue_len(input.len());
        let sequence = packet.sequence;
        let started = Instant::now();

        match stage.process(packet) {
            Ok(out) => {
                let latency_us = elapsed_us(started);
                metrics.record(true, latency_us);
                observability::record_stage_processed(name, true, latency_us as f64 / 1000.0);
                if output.push(out).is_err() {
                    debug!(stage = %name, sequence, "Backend queue closed");
                    break;
                }
            }
            Err(e) => {
                let latency_us = elapsed_us(started);
                metrics.record(false, latency_us);
                observability::record_stage_processed(name, false, latency_us as f64 / 1000.0);
                error!(stage = %name, sequence, error = %e, "Stage processing failed");
                // Continue processing - a bad packet doesn't stop the stage
            }
        }
    }

    stage.finish();
    debug!(stage = %name, processed = metrics.processed_count(), "Frontend worker stopped");
}

/// Worker loop that feeds frontend output through the backend
#[instrument(
    name = "backend_worker_loop",
    skip(stage, input, metrics),
    fields(stage = %name)
)]
fn backend_worker<I, B: BackendStage<I>>(
    mut stage: B,
    input: &BlockingQueue<I>,
    metrics: &StageMetrics,
    name: &str,
) {
    debug!(stage = %name, "Backend worker started");

    while let Ok(item) = input.pop() {
        metrics.set_queue_len(input.len());
        let started = Instant::now();

        let result = stage.process(item);
        let latency_us = elapsed_us(started);
        metrics.record(result.is_ok(), latency_us);
        observability::record_stage_processed(name, result.is_ok(), latency_us as f64 / 1000.0);
        if let Err(e) = result {
            error!(stage = %name, error = %e, "Stage processing failed");
        }
    }

    stage.finish();
    debug!(stage = %name, processed = metrics.processed_count(), "Backend worker stopped");
}
