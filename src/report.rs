use std::io::Write;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::select;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ReportFormat;
use crate::lifecycle::RunState;
use crate::metrics::{LoopReport, MetricsSnapshot, SharedSnapshot};

/// Receives a copy of the snapshot on every reporting tick.
pub trait ReportSink: Send + 'static {
    fn emit(&mut self, snapshot: &MetricsSnapshot);
}

/// `CPU: 12.3%, RAM: 45.6%, Used: 7321 MB, Disk: 78.9%`
pub fn format_report(snapshot: &MetricsSnapshot) -> String {
    format!(
        "CPU: {:.1}%, RAM: {:.1}%, Used: {} MB, Disk: {:.1}%",
        snapshot.cpu.value.percent,
        snapshot.memory.value.used_percent,
        snapshot.memory.value.used_mb(),
        snapshot.disk.value.used_percent,
    )
}

pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, snapshot: &MetricsSnapshot) {
        info!("{}", format_report(snapshot));
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send + 'static> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, snapshot: &MetricsSnapshot) {
        if let Err(err) = self.write_line(snapshot) {
            warn!("failed to write report line: {}", err);
        }
    }
}

pub fn sink_for(format: ReportFormat) -> Box<dyn ReportSink> {
    match format {
        ReportFormat::Log => Box::new(LogSink),
        ReportFormat::JsonLines => Box::new(JsonLinesSink::new(std::io::stdout())),
    }
}

/// Reads the snapshot on a fixed cadence and hands a copy to a sink.
/// Never writes to the snapshot.
pub struct ReportingLoop {
    period: Duration,
    run_state: RunState,
    snapshot: SharedSnapshot,
    sink: Box<dyn ReportSink>,
}

impl ReportingLoop {
    pub fn new(
        period: Duration,
        run_state: RunState,
        snapshot: SharedSnapshot,
        sink: Box<dyn ReportSink>,
    ) -> Self {
        ReportingLoop {
            period,
            run_state,
            snapshot,
            sink,
        }
    }

    pub async fn run(mut self) -> LoopReport {
        let mut report = LoopReport::new("report");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                biased;
                _ = self.run_state.stopped() => break,
                _ = ticker.tick() => {}
            }

            // Lock is released before emitting.
            let current = self.snapshot.latest().await;
            self.sink.emit(&current);
            report.iterations += 1;
        }

        debug!("report loop stopped after {} reports", report.iterations);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CpuSample, DiskSample, MemorySample};
    use std::sync::{Arc, Mutex};

    fn sample_snapshot() -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::stale();
        snapshot
            .cpu
            .record_fresh(CpuSample { percent: 12.34 }, Duration::ZERO, "test");
        snapshot.memory.record_fresh(
            MemorySample::from_totals(8 * 1024 * 1024 * 1024, 6 * 1024 * 1024 * 1024),
            Duration::ZERO,
            "test",
        );
        snapshot
            .disk
            .record_fresh(DiskSample::from_totals(1_000, 211), Duration::ZERO, "test");
        snapshot
    }

    #[test]
    fn formats_all_three_metrics() {
        assert_eq!(
            format_report(&sample_snapshot()),
            "CPU: 12.3%, RAM: 25.0%, Used: 2048 MB, Disk: 78.9%"
        );
    }

    #[test]
    fn stale_snapshot_formats_as_zeros() {
        assert_eq!(
            format_report(&MetricsSnapshot::stale()),
            "CPU: 0.0%, RAM: 0.0%, Used: 0 MB, Disk: 0.0%"
        );
    }

    #[test]
    fn json_sink_writes_one_line_per_report() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&sample_snapshot());
        sink.emit(&MetricsSnapshot::stale());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["memory"]["value"]["used_bytes"], 2u64 * 1024 * 1024 * 1024);
        assert_eq!(first["disk"]["generation"], 1);
        assert_eq!(first["cpu"]["source"], "test");
    }

    struct Collect(Arc<Mutex<Vec<MetricsSnapshot>>>);

    impl ReportSink for Collect {
        fn emit(&mut self, snapshot: &MetricsSnapshot) {
            self.0.lock().unwrap().push(snapshot.clone());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_on_its_own_cadence_and_stops() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let run_state = RunState::new();
        let snapshot = SharedSnapshot::new();
        let task = tokio::spawn(
            ReportingLoop::new(
                Duration::from_millis(300),
                run_state.clone(),
                snapshot.clone(),
                Box::new(Collect(Arc::clone(&seen))),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        run_state.stop();
        let report = task.await.unwrap();

        // ticks at 0, 300, 600, 900ms
        assert_eq!(report.iterations, 4);
        assert_eq!(seen.lock().unwrap().len(), 4);
        let latest = snapshot.latest().await;
        assert!(!latest.cpu.is_initialized());
        assert!(!latest.memory.is_initialized());
        assert!(!latest.disk.is_initialized());
    }
}
