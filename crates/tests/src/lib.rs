//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 回放数据 e2e 测试 (ingestion -> assembler -> frontend -> backend)
//! - 生命周期与关闭路径测试

#[cfg(test)]
mod contract_tests {
    use contracts::time::millis;
    use contracts::{DropReason, QueueCapacity};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_drop_reason_labels() {
        // metrics 标签值是对外契约
        assert_eq!(DropReason::DataGap.as_str(), "data_gap");
        assert_eq!(DropReason::CoverageTimeout.as_str(), "coverage_timeout");
        assert_eq!(DropReason::StreamEnded.as_str(), "stream_ended");
        assert_eq!(DropReason::NonIncreasingFrame.as_str(), "non_increasing_frame");
    }

    #[test]
    fn test_time_helpers() {
        assert_eq!(millis(5), 5_000_000);
        assert_eq!(QueueCapacity::bounded(3).limit(), Some(3));
        assert_eq!(QueueCapacity::Unbounded.limit(), None);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::time::millis;
    use contracts::{
        DropReason, InertialSample, PipelineConfig, PoseReference, QueueCapacity,
        SynchronizedPacket, Timestamp,
    };
    use coordinator::{
        BackendStage, FrontendStage, LogBackend, LogFrontend, Phase, PipelineCoordinator,
        PipelineSources, ShutdownHandle, StageError,
    };
    use ingestion::{
        MockImuSource, MockStereoCamera, VecFrameSource, VecInertialSource, VecPoseSource,
    };
    use nalgebra::{UnitQuaternion, Vector3};
    use parking_lot::Mutex;

    const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

    fn sample(ts: Timestamp) -> InertialSample {
        InertialSample::new(
            ts,
            Vector3::new(0.0, 0.0, 0.1),
            Vector3::new(0.0, 0.0, 9.81),
        )
    }

    fn inertial_ms(timestamps: impl IntoIterator<Item = i64>) -> Box<VecInertialSource> {
        Box::new(VecInertialSource::new(
            "imu",
            timestamps.into_iter().map(|ms| sample(millis(ms))).collect(),
        ))
    }

    fn frames_ms(timestamps: &[i64]) -> Box<VecFrameSource> {
        let ts: Vec<_> = timestamps.iter().map(|ms| millis(*ms)).collect();
        Box::new(VecFrameSource::from_timestamps("cam", &ts))
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.sync.pipeline_start_ns = Some(0);
        config.sync.max_inertial_wait_ms = 1000;
        config
    }

    /// Frontend that forwards packets untouched
    struct PassThrough;

    impl FrontendStage for PassThrough {
        type Output = SynchronizedPacket;

        fn name(&self) -> &str {
            "pass_through"
        }

        fn process(&mut self, packet: SynchronizedPacket) -> Result<SynchronizedPacket, StageError> {
            Ok(packet)
        }
    }

    /// Backend that records every packet, optionally slowly, optionally
    /// stopping the pipeline after `stop_after` packets.
    struct Recorder {
        packets: Arc<Mutex<Vec<SynchronizedPacket>>>,
        delay: Duration,
        stop_after: Option<(usize, ShutdownHandle)>,
    }

    impl Recorder {
        fn new(packets: Arc<Mutex<Vec<SynchronizedPacket>>>) -> Self {
            Self {
                packets,
                delay: Duration::ZERO,
                stop_after: None,
            }
        }
    }

    impl BackendStage<SynchronizedPacket> for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn process(&mut self, packet: SynchronizedPacket) -> Result<(), StageError> {
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            let count = {
                let mut packets = self.packets.lock();
                packets.push(packet);
                packets.len()
            };
            if let Some((limit, handle)) = &self.stop_after {
                if count == *limit {
                    handle.request_shutdown();
                    return Err(StageError::processing("recorder", "packet limit reached"));
                }
            }
            Ok(())
        }
    }

    fn run_to_completion(
        config: PipelineConfig,
        sources: PipelineSources,
        backend: Recorder,
    ) -> PipelineCoordinator {
        let coordinator = PipelineCoordinator::new(config);
        coordinator.start(sources, PassThrough, backend).unwrap();
        assert!(
            coordinator.wait_for_completion(Some(COMPLETION_TIMEOUT)),
            "pipeline did not complete"
        );
        coordinator.drain();
        coordinator
    }

    /// 连续帧的惯性区间首尾相接，且覆盖 [prev_frame_ts, frame_ts]
    #[test]
    fn test_e2e_interval_chain() {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let frames = [33, 66, 100, 150, 200, 250];
        let coordinator = run_to_completion(
            config(),
            PipelineSources {
                inertial: inertial_ms((0..=300).step_by(5)),
                frames: frames_ms(&frames),
                poses: None,
            },
            Recorder::new(Arc::clone(&packets)),
        );

        let packets = packets.lock();
        assert_eq!(packets.len(), frames.len());

        let mut prev_end = 0;
        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet.sequence, i as u64);
            assert_eq!(packet.interval_start_ts, prev_end);
            assert_eq!(packet.interval_end_ts, millis(frames[i]));
            assert_eq!(packet.frame.timestamp, packet.interval_end_ts);

            let interval = &packet.inertial_interval;
            assert_eq!(interval.first().map(|s| s.timestamp), Some(packet.interval_start_ts));
            assert_eq!(interval.last().map(|s| s.timestamp), Some(packet.interval_end_ts));
            assert!(interval.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            prev_end = packet.interval_end_ts;
        }

        // 66 ms lies between 65 and 70: interpolated boundary sample
        let boundary = packets[1].inertial_interval.last().unwrap();
        assert_eq!(boundary.timestamp, millis(66));
        assert!((boundary.linear_acceleration.z - 9.81).abs() < 1e-12);

        let report = coordinator.report();
        assert_eq!(report.phase, Phase::Stopped);
        assert_eq!(report.assembler.frames_dropped(), 0);
        assert_eq!(report.ingestion.samples_received, 61);
    }

    /// 缓冲区起点晚于区间起点时帧被丢弃，之后的区间从被丢弃帧开始
    #[test]
    fn test_e2e_data_gap_drops_then_recovers() {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let coordinator = run_to_completion(
            config(),
            PipelineSources {
                inertial: inertial_ms((100..=300).step_by(10)),
                frames: frames_ms(&[50, 150, 200, 250]),
                poses: None,
            },
            Recorder::new(Arc::clone(&packets)),
        );

        let report = coordinator.report();
        assert_eq!(report.assembler.dropped_data_gap, 2);
        assert!(report
            .recent_drops
            .iter()
            .all(|d| d.reason == DropReason::DataGap));
        assert_eq!(report.recent_drops[0].interval_start, 0);
        assert_eq!(report.recent_drops[1].interval_start, millis(50));

        let packets = packets.lock();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].interval_start_ts, millis(150));
        assert_eq!(packets[0].interval_end_ts, millis(200));
        assert_eq!(packets[0].sequence, 0);
        assert_eq!(packets[1].interval_start_ts, millis(200));
    }

    /// 惯性流违反时钟契约：记录致命错误，剩余帧按 StreamEnded 丢弃
    #[test]
    fn test_e2e_fatal_out_of_order_inertial() {
        let mut config = config();
        config.shutdown.on_fatal = false;

        let packets = Arc::new(Mutex::new(Vec::new()));
        let coordinator = run_to_completion(
            config,
            PipelineSources {
                inertial: inertial_ms((0..=100).step_by(10).chain([95, 110])),
                frames: frames_ms(&[50, 100, 150, 200]),
                poses: None,
            },
            Recorder::new(Arc::clone(&packets)),
        );

        let report = coordinator.report();
        assert!(report.fatal_error.is_some());
        assert_eq!(report.ingestion.rejected, 1);
        assert_eq!(report.assembler.packets_dispatched, 2);
        assert_eq!(report.assembler.dropped_stream_ended, 2);
        assert_eq!(report.stream_errors.len(), 1);
        assert_eq!(packets.lock().len(), 2);
    }

    /// 后端在处理过程中请求关闭 (在工作线程内调用)
    #[test]
    fn test_e2e_shutdown_from_stage() {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let coordinator = PipelineCoordinator::new(config());

        let mut recorder = Recorder::new(Arc::clone(&packets));
        recorder.stop_after = Some((3, coordinator.shutdown_handle()));

        let origin = Instant::now();
        coordinator
            .start(
                PipelineSources {
                    inertial: Box::new(MockImuSource::new("imu", 200.0).paced(origin)),
                    frames: Box::new(MockStereoCamera::new("cam", 50.0, 8, 8).paced(origin)),
                    poses: None,
                },
                PassThrough,
                recorder,
            )
            .unwrap();

        assert!(coordinator.wait_for_completion(Some(COMPLETION_TIMEOUT)));
        coordinator.request_shutdown();

        let report = coordinator.report();
        assert_eq!(report.phase, Phase::Stopped);
        assert!(packets.lock().len() >= 3);
    }

    /// 容量为 1 的队列 + 慢后端：反压下不丢帧、不乱序
    #[test]
    fn test_e2e_backpressure_keeps_every_frame() {
        let mut config = config();
        config.queues.frames = QueueCapacity::bounded(1);
        config.queues.frontend = QueueCapacity::bounded(1);
        config.queues.backend = QueueCapacity::bounded(1);

        let frames: Vec<i64> = (1..=20).map(|i| i * 10).collect();
        let packets = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = Recorder::new(Arc::clone(&packets));
        recorder.delay = Duration::from_millis(2);

        let coordinator = run_to_completion(
            config,
            PipelineSources {
                inertial: inertial_ms(0..=200),
                frames: frames_ms(&frames),
                poses: None,
            },
            recorder,
        );

        let packets = packets.lock();
        assert_eq!(packets.len(), frames.len());
        assert!(packets.windows(2).all(|w| w[0].sequence + 1 == w[1].sequence));
        // Every 1 ms sample plus the bracket endpoints
        assert!(packets.iter().all(|p| p.sample_count() == 11));
        assert_eq!(coordinator.report().assembler.frames_dropped(), 0);
    }

    /// 配置文件 -> 协调器 -> mock 源完整运行
    #[test]
    fn test_e2e_config_to_pipeline() {
        let content = r#"
[sync]
max_inertial_wait_ms = 500

[queues]
frames = { mode = "bounded", capacity = 2 }
backend = { mode = "unbounded" }

[reference_buffer]
max_entries = 32

[sources]
camera_rate_hz = 20.0
imu_rate_hz = 200.0
pose_rate_hz = 50.0
image_width = 16
image_height = 8
realtime = false
duration_s = 1.0
"#;
        let config = config_loader::ConfigLoader::load_from_str(
            content,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let sources = PipelineSources {
            inertial: Box::new(MockImuSource::from_config(&config.sources)),
            frames: Box::new(MockStereoCamera::from_config(&config.sources)),
            poses: ingestion::MockPoseSource::from_config(&config.sources)
                .map(|p| Box::new(p) as Box<dyn contracts::PoseSource>),
        };

        let coordinator = PipelineCoordinator::new(config);
        let backend = LogBackend::new("backend").with_reference(coordinator.reference_poses());
        coordinator
            .start(sources, LogFrontend::new("frontend"), backend)
            .unwrap();
        assert!(coordinator.wait_for_completion(Some(COMPLETION_TIMEOUT)));
        coordinator.drain();

        let report = coordinator.report();
        assert_eq!(report.ingestion.frames_received, 20);
        assert_eq!(report.ingestion.samples_received, 201);
        assert_eq!(report.assembler.packets_dispatched, 20);
        assert_eq!(report.backend.map(|b| b.processed), Some(20));
        // Ring capacity bounds the reference buffer
        assert_eq!(report.reference_poses, 32);
        assert!(report.to_string().contains("Pipeline Report"));
    }

    /// 参考位姿与同步包共享同一时钟
    #[test]
    fn test_e2e_reference_poses_available() {
        let poses: Vec<(Timestamp, PoseReference)> = (0..=10)
            .map(|i| {
                (
                    millis(i * 20),
                    PoseReference::new(Vector3::new(i as f64, 0.0, 0.0), UnitQuaternion::identity()),
                )
            })
            .collect();

        let coordinator = PipelineCoordinator::new(config());
        let reference = coordinator.reference_poses();
        coordinator
            .start(
                PipelineSources {
                    inertial: inertial_ms((0..=200).step_by(5)),
                    frames: frames_ms(&[100, 200]),
                    poses: Some(Box::new(VecPoseSource::new("pose", poses))),
                },
                LogFrontend::new("frontend"),
                LogBackend::new("backend").with_reference(Arc::clone(&reference)),
            )
            .unwrap();
        assert!(coordinator.wait_for_completion(Some(COMPLETION_TIMEOUT)));
        coordinator.drain();

        assert_eq!(reference.len(), 11);
        let mid = reference.get_interpolated(millis(110)).unwrap();
        assert!((mid.position.x - 5.5).abs() < 1e-9);
        assert_eq!(coordinator.report().assembler.packets_dispatched, 2);
    }
}
