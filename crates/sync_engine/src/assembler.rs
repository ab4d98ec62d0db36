//! Synchronization assembler.
//!
//! Pairs each camera frame with the inertial samples recorded since the
//! previous frame. Frames whose interval is not yet covered are retried with
//! a bounded backoff, frames whose interval can never be covered are dropped
//! and reported.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{DropReason, FrameDrop, StereoFrame, SyncConfig, SynchronizedPacket, Timestamp};
use observability::{MetricsSummary, SyncMetricsAggregator};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{AssemblerError, BufferError, QueueError};
use crate::imu_buffer::InertialSampleBuffer;
use crate::metrics::{AssemblerMetrics, AssemblerStats};
use crate::queue::BlockingQueue;

/// How long `run` blocks on an empty frame queue before re-checking shutdown
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Lower bound on a single coverage wait slice
const MIN_BACKOFF: Duration = Duration::from_micros(100);

/// Per-frame assembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblerState {
    /// Waiting on the frame queue
    #[default]
    AwaitingFrame,
    /// Frame taken, inertial interval not yet covered
    AwaitingInertialCoverage,
    /// Packet built, not yet accepted by the frontend queue
    Assembled,
    /// Packet accepted by the frontend queue
    Dispatched,
}

/// Result of processing a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    Dispatched {
        sequence: u64,
        frame_id: u64,
        samples: usize,
    },
    Dropped(FrameDrop),
}

/// Final assembler report, returned by [`SyncAssembler::run`]
#[derive(Debug, Clone)]
pub struct AssemblerReport {
    pub stats: AssemblerStats,
    pub summary: MetricsSummary,
}

/// Callback invoked for every dropped frame
pub type DropListener = Box<dyn FnMut(&FrameDrop) + Send>;

enum Coverage {
    Ready(Vec<contracts::InertialSample>),
    Lost(DropReason),
}

/// Builds [`SynchronizedPacket`]s from frames and the shared inertial buffer
/// and pushes them onto the frontend queue.
pub struct SyncAssembler {
    config: SyncConfig,
    inertial: Arc<InertialSampleBuffer>,
    output: Arc<BlockingQueue<SynchronizedPacket>>,
    state: AssemblerState,
    /// End of the last interval handed out or given up on
    prev_frame_ts: Option<Timestamp>,
    next_sequence: u64,
    metrics: Arc<AssemblerMetrics>,
    aggregator: SyncMetricsAggregator,
    drop_listener: Option<DropListener>,
}

impl SyncAssembler {
    pub fn new(
        config: SyncConfig,
        inertial: Arc<InertialSampleBuffer>,
        output: Arc<BlockingQueue<SynchronizedPacket>>,
    ) -> Self {
        Self {
            config,
            inertial,
            output,
            state: AssemblerState::AwaitingFrame,
            prev_frame_ts: None,
            next_sequence: 0,
            metrics: Arc::new(AssemblerMetrics::new()),
            aggregator: SyncMetricsAggregator::new(),
            drop_listener: None,
        }
    }

    /// Invoke `listener` for every dropped frame
    pub fn with_drop_listener(mut self, listener: impl FnMut(&FrameDrop) + Send + 'static) -> Self {
        self.drop_listener = Some(Box::new(listener));
        self
    }

    /// Shared counters, readable while the assembler runs on another thread
    pub fn metrics(&self) -> Arc<AssemblerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// End timestamp of the previous interval
    pub fn last_frame_timestamp(&self) -> Option<Timestamp> {
        self.prev_frame_ts
    }

    fn interval_start(&self, frame_ts: Timestamp) -> Timestamp {
        self.prev_frame_ts
            .or(self.config.pipeline_start_ns)
            .unwrap_or(frame_ts)
    }

    /// Assemble and dispatch a single frame.
    ///
    /// Blocks while the inertial interval is not yet covered, up to
    /// `max_inertial_wait`. Errors only when the pipeline is shutting down.
    #[instrument(
        name = "assembler_process_frame",
        skip(self, frame),
        fields(frame_id = frame.frame_id, frame_ts = frame.timestamp)
    )]
    pub fn process_frame(&mut self, frame: StereoFrame) -> Result<AssemblyOutcome, AssemblerError> {
        self.metrics.inc_frames_received();
        let end_ts = frame.timestamp;
        let start_ts = self.interval_start(end_ts);

        if end_ts < start_ts || self.prev_frame_ts.is_some_and(|prev| end_ts <= prev) {
            return Ok(self.drop_frame(&frame, start_ts, DropReason::NonIncreasingFrame));
        }

        self.state = AssemblerState::AwaitingInertialCoverage;
        let started = Instant::now();
        let inertial_interval = match self.await_coverage(start_ts, end_ts)? {
            Coverage::Ready(samples) => samples,
            Coverage::Lost(reason) => return Ok(self.drop_frame(&frame, start_ts, reason)),
        };
        let waited_ms = started.elapsed().as_secs_f64() * 1000.0;

        let packet = SynchronizedPacket {
            sequence: self.next_sequence,
            frame,
            inertial_interval,
            interval_start_ts: start_ts,
            interval_end_ts: end_ts,
        };
        self.state = AssemblerState::Assembled;

        let sequence = packet.sequence;
        let frame_id = packet.frame.frame_id;
        let samples = packet.sample_count();
        observability::record_packet_dispatched(&packet, waited_ms);
        self.aggregator.update_packet(&packet);

        self.output
            .push(packet)
            .map_err(|_| AssemblerError::OutputClosed)?;

        self.state = AssemblerState::Dispatched;
        self.next_sequence += 1;
        self.prev_frame_ts = Some(end_ts);
        self.metrics.record_dispatch(samples);

        debug!(
            sequence,
            interval_start = start_ts,
            interval_end = end_ts,
            samples,
            waited_ms,
            "Packet dispatched"
        );

        Ok(AssemblyOutcome::Dispatched {
            sequence,
            frame_id,
            samples,
        })
    }

    /// Poll the inertial buffer until `[start_ts, end_ts]` is covered or
    /// can no longer be.
    fn await_coverage(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> Result<Coverage, AssemblerError> {
        let deadline = Instant::now() + self.config.max_inertial_wait();
        let mut backoff = self.config.initial_backoff().max(MIN_BACKOFF);
        let max_backoff = self.config.max_backoff().max(MIN_BACKOFF);

        loop {
            if self.output.is_shutdown() {
                return Err(AssemblerError::Shutdown);
            }

            match self.inertial.extract_interval(start_ts, end_ts) {
                Ok(samples) => return Ok(Coverage::Ready(samples)),
                Err(BufferError::InsufficientData { newest, .. }) => {
                    if self.inertial.is_finished() {
                        // Last samples may have landed just before the stream closed
                        return Ok(match self.inertial.extract_interval(start_ts, end_ts) {
                            Ok(samples) => Coverage::Ready(samples),
                            Err(_) => Coverage::Lost(DropReason::StreamEnded),
                        });
                    }

                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(Coverage::Lost(DropReason::CoverageTimeout));
                    }

                    self.metrics.inc_coverage_retries();
                    observability::record_coverage_retry();
                    trace!(?newest, end_ts, ?backoff, "Awaiting inertial coverage");

                    self.inertial
                        .wait_for_coverage(end_ts, backoff.min(deadline - now));
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(err) => {
                    debug!(error = %err, "Inertial interval unavailable");
                    return Ok(Coverage::Lost(DropReason::DataGap));
                }
            }
        }
    }

    fn drop_frame(
        &mut self,
        frame: &StereoFrame,
        interval_start: Timestamp,
        reason: DropReason,
    ) -> AssemblyOutcome {
        let drop = FrameDrop {
            frame_id: frame.frame_id,
            frame_ts: frame.timestamp,
            interval_start,
            reason,
        };

        warn!(
            frame_id = drop.frame_id,
            frame_ts = drop.frame_ts,
            interval_start,
            reason = %reason,
            "Frame dropped"
        );

        // A lost interval is skipped; the next frame starts at this one
        if reason != DropReason::NonIncreasingFrame {
            self.prev_frame_ts = Some(frame.timestamp);
        }

        self.metrics.record_drop(reason);
        observability::record_frame_dropped(&drop);
        self.aggregator.update_drop(&drop);
        if let Some(listener) = self.drop_listener.as_mut() {
            listener(&drop);
        }

        self.state = AssemblerState::AwaitingFrame;
        AssemblyOutcome::Dropped(drop)
    }

    /// Process frames until the frame queue is drained and closed, or the
    /// frontend queue is shut down.
    pub fn run(&mut self, frames: &BlockingQueue<StereoFrame>) -> AssemblerReport {
        info!(
            max_inertial_wait_ms = self.config.max_inertial_wait_ms,
            "Assembler started"
        );

        loop {
            self.state = AssemblerState::AwaitingFrame;
            let frame = match frames.pop_with_timeout(IDLE_POLL) {
                Ok(frame) => frame,
                Err(QueueError::TimedOut) => {
                    if self.output.is_shutdown() {
                        break;
                    }
                    continue;
                }
                Err(QueueError::Closed) => {
                    debug!("Frame queue closed");
                    break;
                }
            };

            if let Err(e) = self.process_frame(frame) {
                info!(reason = %e, "Assembler stopping");
                break;
            }
        }

        let report = self.report();
        info!(
            frames = report.stats.frames_received,
            dispatched = report.stats.packets_dispatched,
            dropped = report.stats.frames_dropped(),
            "Assembler stopped"
        );
        report
    }

    pub fn report(&self) -> AssemblerReport {
        AssemblerReport {
            stats: self.metrics.snapshot(),
            summary: self.aggregator.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::time::millis;
    use contracts::InertialSample;
    use nalgebra::Vector3;
    use parking_lot::Mutex;
    use std::thread;

    fn sample(ts: Timestamp) -> InertialSample {
        InertialSample::new(ts, Vector3::new(0.0, 0.0, 0.1), Vector3::new(0.0, 0.0, 9.81))
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            max_inertial_wait_ms: 50,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            pipeline_start_ns: None,
        }
    }

    struct Fixture {
        inertial: Arc<InertialSampleBuffer>,
        output: Arc<BlockingQueue<SynchronizedPacket>>,
        assembler: SyncAssembler,
    }

    fn fixture(config: SyncConfig) -> Fixture {
        let inertial = Arc::new(InertialSampleBuffer::new());
        let output = Arc::new(BlockingQueue::unbounded("frontend"));
        let assembler = SyncAssembler::new(config, Arc::clone(&inertial), Arc::clone(&output));
        Fixture {
            inertial,
            output,
            assembler,
        }
    }

    fn fill(buffer: &InertialSampleBuffer, from_ms: i64, to_ms: i64) {
        for ms in (from_ms..=to_ms).step_by(10) {
            buffer.insert(sample(millis(ms))).unwrap();
        }
    }

    #[test]
    fn test_consecutive_intervals_chain() {
        let mut f = fixture(SyncConfig {
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        fill(&f.inertial, 0, 100);

        for (id, ms) in [(0, 50), (1, 73), (2, 100)] {
            let outcome = f
                .assembler
                .process_frame(StereoFrame::empty(id, millis(ms)))
                .unwrap();
            assert!(matches!(outcome, AssemblyOutcome::Dispatched { sequence, .. } if sequence == id));
        }

        let packets: Vec<_> = std::iter::from_fn(|| f.output.try_pop()).collect();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].interval_start_ts, 0);
        assert_eq!(packets[0].sample_count(), 6);
        assert_eq!(packets[1].interval_start_ts, millis(50));
        assert_eq!(
            packets[1]
                .inertial_interval
                .iter()
                .map(|s| s.timestamp)
                .collect::<Vec<_>>(),
            vec![millis(50), millis(60), millis(70), millis(73)]
        );
        for pair in packets.windows(2) {
            assert_eq!(pair[0].interval_end_ts, pair[1].interval_start_ts);
        }
        assert_eq!(f.assembler.state(), AssemblerState::Dispatched);
    }

    #[test]
    fn test_first_frame_without_pipeline_start() {
        let mut f = fixture(fast_config());
        fill(&f.inertial, 0, 40);

        f.assembler
            .process_frame(StereoFrame::empty(0, millis(25)))
            .unwrap();
        let packet = f.output.try_pop().unwrap();
        assert_eq!(packet.interval_start_ts, millis(25));
        assert_eq!(packet.interval_end_ts, millis(25));
        assert_eq!(packet.sample_count(), 1);
    }

    #[test]
    fn test_waits_for_late_inertial_data() {
        let mut f = fixture(SyncConfig {
            max_inertial_wait_ms: 5_000,
            pipeline_start_ns: Some(millis(100)),
            ..fast_config()
        });
        fill(&f.inertial, 100, 150);

        let producer = {
            let inertial = Arc::clone(&f.inertial);
            thread::spawn(move || {
                for ms in (160..=210).step_by(10) {
                    thread::sleep(Duration::from_millis(3));
                    inertial.insert(sample(millis(ms))).unwrap();
                }
            })
        };

        let outcome = f
            .assembler
            .process_frame(StereoFrame::empty(0, millis(200)))
            .unwrap();
        producer.join().unwrap();

        assert!(matches!(outcome, AssemblyOutcome::Dispatched { samples: 11, .. }));
        assert!(f.assembler.metrics().snapshot().coverage_retries > 0);
    }

    #[test]
    fn test_data_gap_drops_and_advances() {
        let drops = Arc::new(Mutex::new(Vec::new()));
        let f = fixture(SyncConfig {
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        let mut assembler = {
            let drops = Arc::clone(&drops);
            f.assembler
                .with_drop_listener(move |drop| drops.lock().push(*drop))
        };
        // Inertial stream only starts at 30 ms
        fill(&f.inertial, 30, 100);

        let outcome = assembler
            .process_frame(StereoFrame::empty(0, millis(50)))
            .unwrap();
        assert_eq!(
            outcome,
            AssemblyOutcome::Dropped(FrameDrop {
                frame_id: 0,
                frame_ts: millis(50),
                interval_start: 0,
                reason: DropReason::DataGap,
            })
        );
        assert_eq!(assembler.last_frame_timestamp(), Some(millis(50)));

        // Next frame resumes from the dropped frame
        assembler
            .process_frame(StereoFrame::empty(1, millis(80)))
            .unwrap();
        let packet = f.output.try_pop().unwrap();
        assert_eq!(packet.sequence, 0);
        assert_eq!(packet.interval_start_ts, millis(50));
        assert_eq!(drops.lock().len(), 1);
    }

    #[test]
    fn test_coverage_timeout() {
        let mut f = fixture(SyncConfig {
            max_inertial_wait_ms: 20,
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        fill(&f.inertial, 0, 50);

        let started = Instant::now();
        let outcome = f
            .assembler
            .process_frame(StereoFrame::empty(0, millis(200)))
            .unwrap();

        assert!(matches!(
            outcome,
            AssemblyOutcome::Dropped(FrameDrop {
                reason: DropReason::CoverageTimeout,
                ..
            })
        ));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(f.output.is_empty());
        assert_eq!(f.assembler.metrics().snapshot().dropped_coverage_timeout, 1);
    }

    #[test]
    fn test_stream_ended() {
        let mut f = fixture(SyncConfig {
            max_inertial_wait_ms: 10_000,
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        fill(&f.inertial, 0, 50);
        f.inertial.mark_finished();

        let started = Instant::now();
        let outcome = f
            .assembler
            .process_frame(StereoFrame::empty(0, millis(200)))
            .unwrap();
        assert!(matches!(
            outcome,
            AssemblyOutcome::Dropped(FrameDrop {
                reason: DropReason::StreamEnded,
                ..
            })
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_non_increasing_frame_dropped() {
        let mut f = fixture(fast_config());
        fill(&f.inertial, 0, 100);

        f.assembler
            .process_frame(StereoFrame::empty(0, millis(50)))
            .unwrap();
        let outcome = f
            .assembler
            .process_frame(StereoFrame::empty(1, millis(50)))
            .unwrap();

        assert!(matches!(
            outcome,
            AssemblyOutcome::Dropped(FrameDrop {
                reason: DropReason::NonIncreasingFrame,
                ..
            })
        ));
        assert_eq!(f.assembler.last_frame_timestamp(), Some(millis(50)));
        assert_eq!(f.output.len(), 1);
    }

    #[test]
    fn test_shutdown_while_waiting() {
        let mut f = fixture(SyncConfig {
            max_inertial_wait_ms: 60_000,
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        fill(&f.inertial, 0, 50);

        let output = Arc::clone(&f.output);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            output.shutdown();
        });

        let result = f
            .assembler
            .process_frame(StereoFrame::empty(0, millis(200)));
        stopper.join().unwrap();

        assert_eq!(result, Err(AssemblerError::Shutdown));
        assert!(f.output.is_empty());
    }

    #[test]
    fn test_run_drains_frame_queue() {
        let mut f = fixture(SyncConfig {
            pipeline_start_ns: Some(0),
            ..fast_config()
        });
        fill(&f.inertial, 0, 100);

        let frames = BlockingQueue::unbounded("frames");
        for (id, ms) in [(0, 20), (1, 40), (2, 60)] {
            frames.push(StereoFrame::empty(id, millis(ms))).unwrap();
        }
        frames.shutdown();

        let report = f.assembler.run(&frames);
        assert_eq!(report.stats.frames_received, 3);
        assert_eq!(report.stats.packets_dispatched, 3);
        assert_eq!(report.summary.total_packets, 3);
        assert_eq!(f.output.len(), 3);
    }
}
