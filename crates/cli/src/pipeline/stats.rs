//! Pipeline statistics and metrics.

use std::fmt;
use std::time::Duration;

use coordinator::PipelineReport;

/// Why the run loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All sources ended and the chain drained
    Completed,
    /// Ctrl+C / SIGTERM
    Interrupted,
    TimedOut,
    FrameLimit,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Interrupted => "interrupted",
            RunOutcome::TimedOut => "timed_out",
            RunOutcome::FrameLimit => "frame_limit",
        };
        f.write_str(s)
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub outcome: RunOutcome,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Final coordinator report
    pub report: PipelineReport,
}

impl PipelineStats {
    /// Dispatched packets per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.report.assembler.packets_dispatched as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let report = &self.report;
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Outcome: {}", self.outcome);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Inertial samples: {}", report.ingestion.samples_received);
        println!("   ├─ Stereo frames: {}", report.ingestion.frames_received);
        println!("   ├─ Reference poses: {}", report.reference_poses);
        println!("   └─ FPS: {:.2}", self.fps());

        println!("\n📈 Assembler");
        println!("   ├─ Packets dispatched: {}", report.assembler.packets_dispatched);
        println!("   ├─ Samples dispatched: {}", report.assembler.samples_dispatched);
        println!("   ├─ Coverage retries: {}", report.assembler.coverage_retries);
        println!("   └─ Frames dropped: {}", report.assembler.frames_dropped());

        if let Some(summary) = &report.assembler_summary {
            println!(
                "\n   Interval (ms): mean {:.2}, min {:.2}, max {:.2}",
                summary.interval_ms.mean, summary.interval_ms.min, summary.interval_ms.max
            );
            println!(
                "   Samples/packet: mean {:.1}, min {:.0}, max {:.0}",
                summary.samples_per_packet.mean,
                summary.samples_per_packet.min,
                summary.samples_per_packet.max
            );
        }

        for (name, stage) in [("Frontend", &report.frontend), ("Backend", &report.backend)] {
            if let Some(stage) = stage {
                println!(
                    "\n🔧 {}: {} processed, {} failed, {:.3} ms mean latency",
                    name, stage.processed, stage.failures, stage.mean_latency_ms
                );
            }
        }

        if !report.recent_drops.is_empty() {
            println!("\n⚠️  Recent Drops");
            for drop in &report.recent_drops {
                println!(
                    "   ├─ frame {} @ {} ns: {}",
                    drop.frame_id, drop.frame_ts, drop.reason
                );
            }
        }

        if let Some(fatal) = &report.fatal_error {
            println!("\n✗ Fatal: {}", fatal);
        }

        println!();
    }
}
