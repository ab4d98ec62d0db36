//! Ingestion Pipeline main entry
//!
//! One OS thread per sensor stream. Each thread pulls from its source and
//! hands readings to the sync core: inertial samples into the shared
//! [`InertialSampleBuffer`], frames into the frame queue, reference poses into
//! the pose [`TemporalBuffer`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use contracts::{FrameSource, InertialSource, PoseReference, PoseSource, StereoFrame};
use sync_engine::{BlockingQueue, InertialSampleBuffer, TemporalBuffer};
use tracing::{debug, error, info, instrument, warn};

use crate::config::IngestionMetrics;
use crate::error::{IngestionError, Result};

/// How often the inertial thread publishes the buffer depth gauge
const DEPTH_REPORT_EVERY: u64 = 64;

/// Invoked from the failing ingestion thread on a fatal sensor error
pub type FatalHook = Arc<dyn Fn(&IngestionError) + Send + Sync>;

/// Kind of sensor stream handled by an ingestion thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Inertial,
    Camera,
    Pose,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Inertial => "inertial",
            StreamKind::Camera => "camera",
            StreamKind::Pose => "pose",
        }
    }
}

/// Handle to a running ingestion thread
#[derive(Debug)]
pub struct IngestionHandle {
    sensor_id: String,
    kind: StreamKind,
    handle: JoinHandle<Result<u64>>,
}

impl IngestionHandle {
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread and return the number of readings it ingested
    pub fn join(self) -> Result<u64> {
        self.handle
            .join()
            .map_err(|_| IngestionError::WorkerPanicked {
                sensor_id: self.sensor_id,
            })?
    }
}

/// Ingestion Pipeline
///
/// Spawns ingestion threads sharing one running flag and one metrics
/// instance. Stopping is cooperative: threads check the flag between readings.
pub struct IngestionPipeline {
    running: Arc<AtomicBool>,
    metrics: Arc<IngestionMetrics>,
    fatal_hook: Option<FatalHook>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(IngestionMetrics::new()),
            fatal_hook: None,
        }
    }

    /// Call `hook` when a stream hits a contract violation
    pub fn with_fatal_hook(mut self, hook: impl Fn(&IngestionError) + Send + Sync + 'static) -> Self {
        self.fatal_hook = Some(Arc::new(hook));
        self
    }

    /// Start the inertial ingestion thread.
    ///
    /// A non-increasing timestamp is fatal for the stream: the thread stops,
    /// marks the buffer finished and invokes the fatal hook.
    #[instrument(
        name = "ingestion_spawn_inertial",
        skip(self, source, buffer),
        fields(sensor_id = %source.sensor_id())
    )]
    pub fn spawn_inertial(
        &self,
        source: Box<dyn InertialSource>,
        buffer: Arc<InertialSampleBuffer>,
    ) -> Result<IngestionHandle> {
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);
        let hook = self.fatal_hook.clone();
        self.spawn(source.sensor_id().to_string(), StreamKind::Inertial, move || {
            let result = inertial_worker(source, &buffer, &running, &metrics);
            buffer.mark_finished();
            if let (Err(err), Some(hook)) = (&result, hook) {
                hook(err);
            }
            result
        })
    }

    /// Start the camera ingestion thread.
    ///
    /// Pushing blocks while the frame queue is full. When the source ends the
    /// frame queue is shut down so downstream stages drain and stop.
    #[instrument(
        name = "ingestion_spawn_camera",
        skip(self, source, queue),
        fields(sensor_id = %source.sensor_id())
    )]
    pub fn spawn_camera(
        &self,
        source: Box<dyn FrameSource>,
        queue: Arc<BlockingQueue<StereoFrame>>,
    ) -> Result<IngestionHandle> {
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);
        self.spawn(source.sensor_id().to_string(), StreamKind::Camera, move || {
            camera_worker(source, &queue, &running, &metrics)
        })
    }

    /// Start the reference pose ingestion thread.
    /// Out-of-order poses are skipped, the stream keeps going.
    #[instrument(
        name = "ingestion_spawn_pose",
        skip(self, source, buffer),
        fields(sensor_id = %source.sensor_id())
    )]
    pub fn spawn_pose(
        &self,
        source: Box<dyn PoseSource>,
        buffer: Arc<TemporalBuffer<PoseReference>>,
    ) -> Result<IngestionHandle> {
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);
        self.spawn(source.sensor_id().to_string(), StreamKind::Pose, move || {
            pose_worker(source, &buffer, &running, &metrics)
        })
    }

    fn spawn<F>(&self, sensor_id: String, kind: StreamKind, work: F) -> Result<IngestionHandle>
    where
        F: FnOnce() -> Result<u64> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("ingest-{}", sensor_id))
            .spawn(work)
            .map_err(|source| IngestionError::Spawn {
                sensor_id: sensor_id.clone(),
                source,
            })?;

        debug!(sensor_id = %sensor_id, kind = kind.as_str(), "ingestion thread started");
        Ok(IngestionHandle {
            sensor_id,
            kind,
            handle,
        })
    }

    /// Ask every ingestion thread to stop after its current reading
    pub fn stop_all(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("stopping all ingestion threads");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }
}

fn inertial_worker(
    mut source: Box<dyn InertialSource>,
    buffer: &InertialSampleBuffer,
    running: &AtomicBool,
    metrics: &IngestionMetrics,
) -> Result<u64> {
    let sensor_id = source.sensor_id().to_string();
    let mut count = 0u64;

    while running.load(Ordering::Relaxed) {
        let Some(sample) = source.next_sample() else {
            debug!(sensor_id = %sensor_id, samples = count, "inertial stream ended");
            break;
        };

        if let Err(err) = buffer.insert(sample) {
            metrics.record_rejected();
            observability::record_insertion_rejected(&sensor_id);
            error!(
                sensor_id = %sensor_id,
                timestamp = sample.timestamp,
                error = %err,
                "inertial sensor violated clock contract, stopping stream"
            );
            return Err(IngestionError::OutOfOrder {
                sensor_id,
                timestamp: sample.timestamp,
                source: err,
            });
        }

        count += 1;
        metrics.record_sample();
        observability::record_sample_received(&sensor_id, StreamKind::Inertial.as_str());
        if count % DEPTH_REPORT_EVERY == 0 {
            observability::record_buffer_depth(&sensor_id, buffer.len());
        }
    }

    Ok(count)
}

fn camera_worker(
    mut source: Box<dyn FrameSource>,
    queue: &BlockingQueue<StereoFrame>,
    running: &AtomicBool,
    metrics: &IngestionMetrics,
) -> Result<u64> {
    let sensor_id = source.sensor_id().to_string();
    let mut count = 0u64;

    while running.load(Ordering::Relaxed) {
        let Some(frame) = source.next_frame() else {
            debug!(sensor_id = %sensor_id, frames = count, "camera stream ended");
            queue.shutdown();
            break;
        };

        let frame_id = frame.frame_id;
        if queue.push(frame).is_err() {
            metrics.record_frame_discarded();
            debug!(sensor_id = %sensor_id, frame_id, "frame queue closed, camera stopping");
            break;
        }

        count += 1;
        metrics.record_frame();
        observability::record_sample_received(&sensor_id, StreamKind::Camera.as_str());
    }

    Ok(count)
}

fn pose_worker(
    mut source: Box<dyn PoseSource>,
    buffer: &TemporalBuffer<PoseReference>,
    running: &AtomicBool,
    metrics: &IngestionMetrics,
) -> Result<u64> {
    let sensor_id = source.sensor_id().to_string();
    let mut count = 0u64;

    while running.load(Ordering::Relaxed) {
        let Some((timestamp, pose)) = source.next_pose() else {
            debug!(sensor_id = %sensor_id, poses = count, "pose stream ended");
            break;
        };

        match buffer.insert(timestamp, pose) {
            Ok(()) => {
                count += 1;
                metrics.record_pose();
                observability::record_sample_received(&sensor_id, StreamKind::Pose.as_str());
            }
            Err(err) => {
                metrics.record_rejected();
                observability::record_insertion_rejected(&sensor_id);
                warn!(sensor_id = %sensor_id, timestamp, error = %err, "pose skipped");
            }
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockImuSource, MockPoseSource, MockStereoCamera};
    use crate::replay::{VecFrameSource, VecInertialSource};
    use contracts::time::millis;
    use contracts::InertialSample;
    use nalgebra::Vector3;
    use std::sync::atomic::AtomicU64;

    fn sample(ts: i64) -> InertialSample {
        InertialSample::new(ts, Vector3::zeros(), Vector3::new(0.0, 0.0, 9.81))
    }

    #[test]
    fn test_inertial_stream_fills_buffer() {
        let pipeline = IngestionPipeline::new();
        let buffer = Arc::new(InertialSampleBuffer::new());

        let handle = pipeline
            .spawn_inertial(
                Box::new(MockImuSource::new("imu", 200.0).with_limit(50)),
                Arc::clone(&buffer),
            )
            .unwrap();
        assert_eq!(handle.kind(), StreamKind::Inertial);

        assert_eq!(handle.join().unwrap(), 50);
        assert_eq!(buffer.len(), 50);
        assert!(buffer.is_finished());
        assert_eq!(pipeline.metrics().snapshot().samples_received, 50);
    }

    #[test]
    fn test_out_of_order_is_fatal() {
        let fatal_calls = Arc::new(AtomicU64::new(0));
        let pipeline = {
            let fatal_calls = Arc::clone(&fatal_calls);
            IngestionPipeline::new().with_fatal_hook(move |err| {
                assert!(err.is_fatal());
                fatal_calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let buffer = Arc::new(InertialSampleBuffer::new());
        let samples = vec![sample(0), sample(10), sample(10), sample(20)];

        let handle = pipeline
            .spawn_inertial(
                Box::new(VecInertialSource::new("imu", samples)),
                Arc::clone(&buffer),
            )
            .unwrap();

        let err = handle.join().unwrap_err();
        assert!(matches!(err, IngestionError::OutOfOrder { timestamp: 10, .. }));
        assert_eq!(fatal_calls.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.len(), 2);
        assert!(buffer.is_finished());
        assert_eq!(pipeline.metrics().snapshot().rejected, 1);
    }

    #[test]
    fn test_camera_end_closes_frame_queue() {
        let pipeline = IngestionPipeline::new();
        let queue = Arc::new(BlockingQueue::bounded("frames", 8));

        let handle = pipeline
            .spawn_camera(
                Box::new(VecFrameSource::from_timestamps("cam", &[millis(50), millis(100)])),
                Arc::clone(&queue),
            )
            .unwrap();

        assert_eq!(handle.join().unwrap(), 2);
        assert!(queue.is_shutdown());
        assert_eq!(queue.pop().map(|f| f.frame_id), Ok(0));
        assert_eq!(queue.pop().map(|f| f.frame_id), Ok(1));
        assert!(queue.pop().is_err());
    }

    #[test]
    fn test_camera_stops_when_queue_closed() {
        let pipeline = IngestionPipeline::new();
        let queue = Arc::new(BlockingQueue::bounded("frames", 1));

        let handle = pipeline
            .spawn_camera(
                Box::new(MockStereoCamera::new("cam", 1000.0, 4, 4)),
                Arc::clone(&queue),
            )
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        queue.shutdown();

        assert!(handle.join().is_ok());
        assert_eq!(pipeline.metrics().snapshot().frames_discarded, 1);
    }

    #[test]
    fn test_stop_all() {
        let pipeline = IngestionPipeline::new();
        let buffer = Arc::new(TemporalBuffer::new(16, None));

        let handle = pipeline
            .spawn_pose(
                Box::new(MockPoseSource::new("pose", 1000.0).paced(std::time::Instant::now())),
                Arc::clone(&buffer),
            )
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        pipeline.stop_all();
        assert!(!pipeline.is_running());

        let ingested = handle.join().unwrap();
        assert!(ingested > 0);
        assert_eq!(buffer.len() as u64, ingested.min(16));
    }
}
