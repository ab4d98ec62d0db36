//! VIO 同步核心指标收集模块
//!
//! 基于 SynchronizedPacket / FrameDrop 收集和统计同步核心的运行指标。

use std::collections::HashMap;

use contracts::{FrameDrop, SynchronizedPacket};
use metrics::{counter, gauge, histogram};

/// 从 SynchronizedPacket 记录指标
///
/// 每次 assembler 分发一个同步包时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_packet_dispatched;
///
/// record_packet_dispatched(&packet, waited_ms);
/// frontend_queue.push(packet)?;
/// ```
pub fn record_packet_dispatched(packet: &SynchronizedPacket, coverage_wait_ms: f64) {
    counter!("vio_sync_packets_dispatched_total").increment(1);

    // 序号 (用于检测跳帧)
    gauge!("vio_sync_last_sequence").set(packet.sequence as f64);
    gauge!("vio_sync_last_frame_id").set(packet.frame.frame_id as f64);

    histogram!("vio_sync_interval_samples").record(packet.sample_count() as f64);
    histogram!("vio_sync_interval_duration_ms")
        .record(contracts::time::as_millis_f64(packet.interval_duration()));
    histogram!("vio_sync_coverage_wait_ms").record(coverage_wait_ms);
}

/// 记录丢帧
pub fn record_frame_dropped(drop: &FrameDrop) {
    counter!(
        "vio_sync_frames_dropped_total",
        "reason" => drop.reason.as_str()
    )
    .increment(1);
}

/// 记录传感器样本接收
pub fn record_sample_received(sensor_id: &str, kind: &'static str) {
    counter!(
        "vio_sync_samples_received_total",
        "sensor_id" => sensor_id.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录乱序插入 (传感器契约违规)
pub fn record_insertion_rejected(sensor_id: &str) {
    counter!(
        "vio_sync_insertions_rejected_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
}

/// 记录 assembler 等待惯性数据的重试
pub fn record_coverage_retry() {
    counter!("vio_sync_coverage_retries_total").increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(queue: &str, depth: usize) {
    gauge!(
        "vio_sync_queue_depth",
        "queue" => queue.to_string()
    )
    .set(depth as f64);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(buffer: &str, depth: usize) {
    gauge!(
        "vio_sync_buffer_depth",
        "buffer" => buffer.to_string()
    )
    .set(depth as f64);
}

/// 记录阶段处理结果
pub fn record_stage_processed(stage: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "vio_sync_stage_packets_total",
        "stage" => stage.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "vio_sync_stage_latency_ms",
        "stage" => stage.to_string()
    )
    .record(latency_ms);
}

/// 同步指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 分发的同步包总数
    pub total_packets: u64,

    /// 丢帧总数
    pub total_dropped: u64,

    /// 每个同步包的惯性样本数统计
    pub samples_stats: RunningStats,

    /// 区间时长统计 (毫秒)
    pub interval_stats: RunningStats,

    /// 各原因丢帧次数
    pub drop_counts: HashMap<String, u64>,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新同步包统计
    pub fn update_packet(&mut self, packet: &SynchronizedPacket) {
        self.total_packets += 1;
        self.samples_stats.push(packet.sample_count() as f64);
        self.interval_stats
            .push(contracts::time::as_millis_f64(packet.interval_duration()));
    }

    /// 更新丢帧统计
    pub fn update_drop(&mut self, drop: &FrameDrop) {
        self.total_dropped += 1;
        *self
            .drop_counts
            .entry(drop.reason.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let frames = self.total_packets + self.total_dropped;
        MetricsSummary {
            total_packets: self.total_packets,
            total_dropped: self.total_dropped,
            drop_rate: if frames > 0 {
                self.total_dropped as f64 / frames as f64 * 100.0
            } else {
                0.0
            },
            samples_per_packet: StatsSummary::from(&self.samples_stats),
            interval_ms: StatsSummary::from(&self.interval_stats),
            drop_counts: self.drop_counts.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_packets: u64,
    pub total_dropped: u64,
    pub drop_rate: f64,
    pub samples_per_packet: StatsSummary,
    pub interval_ms: StatsSummary,
    pub drop_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Metrics Summary ===")?;
        writeln!(f, "Packets dispatched: {}", self.total_packets)?;
        writeln!(
            f,
            "Frames dropped: {} ({:.2}%)",
            self.total_dropped, self.drop_rate
        )?;
        writeln!(f, "Samples per packet: {}", self.samples_per_packet)?;
        writeln!(f, "Interval (ms): {}", self.interval_ms)?;

        if !self.drop_counts.is_empty() {
            writeln!(f, "Drop reasons:")?;
            let mut reasons: Vec<_> = self.drop_counts.iter().collect();
            reasons.sort();
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DropReason, InertialSample, StereoFrame};
    use nalgebra::Vector3;

    fn packet(sequence: u64, start: i64, end: i64, samples: usize) -> SynchronizedPacket {
        SynchronizedPacket {
            sequence,
            frame: StereoFrame::empty(sequence, end),
            inertial_interval: (0..samples)
                .map(|i| InertialSample::new(start + i as i64, Vector3::zeros(), Vector3::zeros()))
                .collect(),
            interval_start_ts: start,
            interval_end_ts: end,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SyncMetricsAggregator::new();

        aggregator.update_packet(&packet(0, 0, 50_000_000, 6));
        aggregator.update_packet(&packet(1, 50_000_000, 100_000_000, 6));
        aggregator.update_drop(&FrameDrop {
            frame_id: 2,
            frame_ts: 150_000_000,
            interval_start: 100_000_000,
            reason: DropReason::DataGap,
        });

        assert_eq!(aggregator.total_packets, 2);
        assert_eq!(aggregator.total_dropped, 1);
        assert_eq!(aggregator.drop_counts.get("data_gap"), Some(&1));

        let summary = aggregator.summary();
        assert!((summary.interval_ms.mean - 50.0).abs() < 1e-9);
        assert!((summary.samples_per_packet.mean - 6.0).abs() < 1e-9);
        assert!((summary.drop_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_packets: 95,
            total_dropped: 5,
            drop_rate: 5.0,
            samples_per_packet: StatsSummary {
                count: 95,
                min: 9.0,
                max: 12.0,
                mean: 11.0,
                std_dev: 0.5,
            },
            interval_ms: StatsSummary::default(),
            drop_counts: HashMap::from([("coverage_timeout".to_string(), 5)]),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Packets dispatched: 95"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("coverage_timeout: 5"));
    }
}
