//! Mock 传感器源
//!
//! 用于无真实硬件环境的测试与演示。所有 mock 源共享同一时间基准
//! (`start_ns` + 序号 × 周期)，可选按标称频率实时节拍输出。

use std::f64::consts::FRAC_PI_2;
use std::thread;
use std::time::{Duration, Instant};

use contracts::time::{nsec_to_sec, sec_to_nsec};
use contracts::{
    FrameSource, ImageData, InertialSample, InertialSource, PoseReference, PoseSource,
    SourcesConfig, StereoFrame, Timestamp,
};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::trace;

/// 实时节拍器
///
/// 将传感器时间戳映射到墙钟：时间戳 `ts` 在 `origin + (ts - start_ns)` 时刻输出。
#[derive(Debug, Clone, Copy)]
struct Pacer {
    origin: Option<Instant>,
    start_ns: Timestamp,
}

impl Pacer {
    fn wait_until(&self, ts: Timestamp) {
        let Some(origin) = self.origin else {
            return;
        };
        let offset = Duration::from_nanos((ts - self.start_ns).max(0) as u64);
        let target = origin + offset;
        let now = Instant::now();
        if target > now {
            thread::sleep(target - now);
        }
    }
}

/// 按频率生成时间戳的序列
#[derive(Debug, Clone, Copy)]
struct Schedule {
    start_ns: Timestamp,
    period_ns: Timestamp,
    index: u64,
    limit: Option<u64>,
    pacer: Pacer,
}

impl Schedule {
    fn new(rate_hz: f64) -> Self {
        Self {
            start_ns: 0,
            period_ns: sec_to_nsec(1.0 / rate_hz).max(1),
            index: 0,
            limit: None,
            pacer: Pacer {
                origin: None,
                start_ns: 0,
            },
        }
    }

    /// 下一个时间戳及其序号，达到上限后返回 None
    fn advance(&mut self) -> Option<(u64, Timestamp)> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }
        let index = self.index;
        let ts = self.start_ns + index as Timestamp * self.period_ns;
        self.index += 1;
        self.pacer.wait_until(ts);
        Some((index, ts))
    }
}

/// 时长 (秒) 对应的样本数
fn sample_limit(duration_s: f64, rate_hz: f64) -> u64 {
    (duration_s * rate_hz).round().max(0.0) as u64
}

macro_rules! schedule_builders {
    ($ty:ty) => {
        impl $ty {
            /// 第一个样本的时间戳 (ns)
            pub fn with_start(mut self, start_ns: Timestamp) -> Self {
                self.schedule.start_ns = start_ns;
                self.schedule.pacer.start_ns = start_ns;
                self
            }

            /// 输出 `count` 个样本后结束
            pub fn with_limit(mut self, count: u64) -> Self {
                self.schedule.limit = Some(count);
                self
            }

            /// 以 `origin` 为墙钟起点实时节拍输出
            pub fn paced(mut self, origin: Instant) -> Self {
                self.schedule.pacer.origin = Some(origin);
                self
            }

            /// 采样周期 (ns)
            pub fn period_ns(&self) -> Timestamp {
                self.schedule.period_ns
            }
        }
    };
}

/// Mock IMU 源
///
/// 平稳的正弦角速度与加速度，加速度 z 轴含重力。
#[derive(Debug, Clone)]
pub struct MockImuSource {
    sensor_id: String,
    schedule: Schedule,
}

schedule_builders!(MockImuSource);

impl MockImuSource {
    /// 创建新的 Mock IMU 源
    pub fn new(sensor_id: impl Into<String>, rate_hz: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            schedule: Schedule::new(rate_hz),
        }
    }

    /// 从 sources 配置创建
    pub fn from_config(config: &SourcesConfig) -> Self {
        let source = Self::new(config.imu_sensor_id.clone(), config.imu_rate_hz);
        match config.duration_s {
            Some(duration) => source.with_limit(sample_limit(duration, config.imu_rate_hz) + 1),
            None => source,
        }
    }

    /// 时刻 `ts` 的理想读数
    pub fn reading_at(ts: Timestamp) -> InertialSample {
        let t = nsec_to_sec(ts);
        InertialSample::new(
            ts,
            Vector3::new(0.1 * t.sin(), 0.05 * t.cos(), 0.2),
            Vector3::new(0.5 * t.cos(), 0.0, 9.81),
        )
    }
}

impl InertialSource for MockImuSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_sample(&mut self) -> Option<InertialSample> {
        let (_, ts) = self.schedule.advance()?;
        trace!(sensor_id = %self.sensor_id, timestamp = ts, "mock imu sample");
        Some(Self::reading_at(ts))
    }
}

/// Mock 双目相机
///
/// 左右图均为纯色灰度图，像素值随帧号变化。
#[derive(Debug, Clone)]
pub struct MockStereoCamera {
    sensor_id: String,
    width: u32,
    height: u32,
    schedule: Schedule,
}

schedule_builders!(MockStereoCamera);

impl MockStereoCamera {
    /// 创建 Mock 双目相机
    pub fn new(sensor_id: impl Into<String>, rate_hz: f64, width: u32, height: u32) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            width,
            height,
            schedule: Schedule::new(rate_hz),
        }
    }

    /// 从 sources 配置创建
    pub fn from_config(config: &SourcesConfig) -> Self {
        let source = Self::new(
            config.camera_sensor_id.clone(),
            config.camera_rate_hz,
            config.image_width,
            config.image_height,
        );
        match config.duration_s {
            Some(duration) => source.with_limit(sample_limit(duration, config.camera_rate_hz)),
            None => source,
        }
    }
}

impl FrameSource for MockStereoCamera {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_frame(&mut self) -> Option<StereoFrame> {
        let (frame_id, ts) = self.schedule.advance()?;
        let shade = (frame_id % 256) as u8;
        trace!(sensor_id = %self.sensor_id, frame_id, timestamp = ts, "mock stereo frame");
        Some(StereoFrame {
            frame_id,
            timestamp: ts,
            left: ImageData::filled(self.width, self.height, shade),
            right: ImageData::filled(self.width, self.height, shade.wrapping_add(1)),
        })
    }
}

/// Mock 参考位姿源
///
/// 半径 `radius` 米的水平圆周运动，航向与切线方向一致。
#[derive(Debug, Clone)]
pub struct MockPoseSource {
    sensor_id: String,
    radius: f64,
    angular_rate: f64,
    schedule: Schedule,
}

schedule_builders!(MockPoseSource);

impl MockPoseSource {
    /// 创建 Mock 位姿源
    pub fn new(sensor_id: impl Into<String>, rate_hz: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            radius: 1.0,
            angular_rate: 0.5,
            schedule: Schedule::new(rate_hz),
        }
    }

    /// 从 sources 配置创建，未配置位姿频率时返回 None
    pub fn from_config(config: &SourcesConfig) -> Option<Self> {
        let rate_hz = config.pose_rate_hz?;
        let source = Self::new("pose0", rate_hz);
        Some(match config.duration_s {
            Some(duration) => source.with_limit(sample_limit(duration, rate_hz) + 1),
            None => source,
        })
    }

    /// 时刻 `ts` 的理想位姿
    pub fn pose_at(&self, ts: Timestamp) -> PoseReference {
        let angle = self.angular_rate * nsec_to_sec(ts);
        PoseReference::new(
            Vector3::new(self.radius * angle.cos(), self.radius * angle.sin(), 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, angle + FRAC_PI_2),
        )
    }
}

impl PoseSource for MockPoseSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn next_pose(&mut self) -> Option<(Timestamp, PoseReference)> {
        let (_, ts) = self.schedule.advance()?;
        Some((ts, self.pose_at(ts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::time::millis;

    #[test]
    fn test_mock_imu_source() {
        let mut source = MockImuSource::new("test_imu", 200.0).with_limit(3);
        assert_eq!(source.period_ns(), millis(5));

        let samples: Vec<_> = std::iter::from_fn(|| source.next_sample()).collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].timestamp, millis(10));
        assert!((samples[0].linear_acceleration.z - 9.81).abs() < 0.01);
    }

    #[test]
    fn test_mock_camera_source() {
        let mut source = MockStereoCamera::new("test_cam", 20.0, 64, 48)
            .with_start(millis(100))
            .with_limit(2);

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.frame_id, 0);
        assert_eq!(frame.timestamp, millis(100));
        assert_eq!(frame.left.width, 64);
        assert_eq!(frame.left.data.len(), 64 * 48);

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.timestamp, millis(150));
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_mock_pose_source_on_circle() {
        let mut source = MockPoseSource::new("pose", 100.0).with_limit(10);
        while let Some((_, pose)) = source.next_pose() {
            assert!((pose.position.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_paced_source_follows_wall_clock() {
        let mut source = MockImuSource::new("paced", 100.0)
            .with_limit(4)
            .paced(Instant::now());

        let started = Instant::now();
        while source.next_sample().is_some() {}
        // Last sample is due 30 ms after the origin
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_from_config_duration() {
        let config = SourcesConfig {
            duration_s: Some(1.0),
            ..Default::default()
        };

        assert_eq!(MockImuSource::from_config(&config).schedule.limit, Some(201));
        assert_eq!(MockStereoCamera::from_config(&config).schedule.limit, Some(20));
        assert!(MockPoseSource::from_config(&SourcesConfig {
            pose_rate_hz: None,
            ..Default::default()
        })
        .is_none());
    }
}
