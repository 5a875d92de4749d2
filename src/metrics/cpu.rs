use std::time::Duration;

use tokio::time::sleep;

use super::error::PlatformQueryError;
use super::types::{percent_of, CpuSample};

/// Gap between the two counter readings of one CPU sample.
///
/// Every `sample_cpu` call suspends its caller for this long, so a CPU
/// interval shorter than this cannot be honoured.
pub const CPU_MEASUREMENT_PAUSE: Duration = Duration::from_millis(200);

#[cfg(target_os = "linux")]
pub const CPU_SOURCE: &str = "procfs::stat";
#[cfg(not(target_os = "linux"))]
pub const CPU_SOURCE: &str = "sysinfo::cpu";

/// One reading of the cumulative, system-wide CPU time counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub idle: u64,
    pub total: u64,
}

pub trait CpuCounterSource {
    fn read(&mut self) -> Result<CpuCounters, PlatformQueryError>;
}

/// Busy share of the time elapsed between two readings.
///
/// Counters that did not advance (or went backwards) yield 0.
pub fn cpu_percent(before: CpuCounters, after: CpuCounters) -> f32 {
    let total_delta = after.total.saturating_sub(before.total);
    let idle_delta = after.idle.saturating_sub(before.idle).min(total_delta);
    percent_of(total_delta - idle_delta, total_delta)
}

/// Reads `source`, waits `pause`, reads again and returns the busy share.
pub async fn measure_cpu<S>(
    source: &mut S,
    pause: Duration,
) -> Result<CpuSample, PlatformQueryError>
where
    S: CpuCounterSource + ?Sized,
{
    let before = source.read()?;
    sleep(pause).await;
    let after = source.read()?;
    Ok(CpuSample {
        percent: cpu_percent(before, after),
    })
}

#[cfg(target_os = "linux")]
pub async fn sample_cpu() -> Result<CpuSample, PlatformQueryError> {
    measure_cpu(&mut ProcStatCounters::default(), CPU_MEASUREMENT_PAUSE).await
}

#[cfg(not(target_os = "linux"))]
pub async fn sample_cpu() -> Result<CpuSample, PlatformQueryError> {
    use sysinfo::System;

    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(PlatformQueryError::Unsupported("cpu time accounting"));
    }

    let mut system = System::new();
    system.refresh_cpu();
    sleep(CPU_MEASUREMENT_PAUSE.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
    system.refresh_cpu();

    if system.cpus().is_empty() {
        return Err(PlatformQueryError::Malformed(CPU_SOURCE, "cpu list empty".to_string()));
    }
    let percent = system.global_cpu_info().cpu_usage().clamp(0.0, 100.0);
    Ok(CpuSample { percent })
}

/// Aggregate `cpu` line of `/proc/stat`.
#[cfg(target_os = "linux")]
pub struct ProcStatCounters {
    path: std::path::PathBuf,
}

#[cfg(target_os = "linux")]
impl Default for ProcStatCounters {
    fn default() -> Self {
        ProcStatCounters {
            path: std::path::PathBuf::from("/proc/stat"),
        }
    }
}

#[cfg(target_os = "linux")]
impl CpuCounterSource for ProcStatCounters {
    fn read(&mut self) -> Result<CpuCounters, PlatformQueryError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|err| PlatformQueryError::Io("read /proc/stat", err))?;
        parse_proc_stat(&content)
    }
}

/// Parses the aggregate line: `cpu user nice system idle iowait irq softirq steal ...`.
///
/// guest/guest_nice are already folded into user/nice and are not summed.
pub fn parse_proc_stat(content: &str) -> Result<CpuCounters, PlatformQueryError> {
    let line = content
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| {
            PlatformQueryError::Malformed("/proc/stat", "no aggregate cpu line".to_string())
        })?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|field| field.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|err| PlatformQueryError::Malformed("/proc/stat", err.to_string()))?;

    if fields.len() < 4 {
        return Err(PlatformQueryError::Malformed(
            "/proc/stat",
            format!("expected at least 4 cpu fields, found {}", fields.len()),
        ));
    }

    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuCounters {
        idle,
        total: fields.iter().sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<CpuCounters>);

    impl CpuCounterSource for Scripted {
        fn read(&mut self) -> Result<CpuCounters, PlatformQueryError> {
            self.0
                .pop_front()
                .ok_or(PlatformQueryError::Unsupported("scripted counters"))
        }
    }

    fn counters(idle: u64, total: u64) -> CpuCounters {
        CpuCounters { idle, total }
    }

    #[test]
    fn zero_delta_reports_zero() {
        let c = counters(500, 1_000);
        assert_eq!(cpu_percent(c, c), 0.0);
    }

    #[test]
    fn busy_share_of_delta() {
        let before = counters(100, 200);
        let after = counters(175, 300);
        assert!((cpu_percent(before, after) - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn backwards_counters_stay_in_range() {
        let before = counters(900, 1_000);
        let after = counters(50, 1_100);
        let pct = cpu_percent(before, after);
        assert!((0.0..=100.0).contains(&pct), "got {}", pct);

        let idle_runs_ahead = counters(1_200, 1_100);
        assert_eq!(cpu_percent(before, idle_runs_ahead), 0.0);
    }

    #[test]
    fn parses_aggregate_line() {
        let stat = "cpu  10 0 5 80 5 0 0 0 0 0\ncpu0 10 0 5 80 5 0 0 0 0 0\nintr 1\n";
        let parsed = parse_proc_stat(stat).unwrap();
        assert_eq!(parsed, counters(85, 100));
    }

    #[test]
    fn rejects_missing_cpu_line() {
        let err = parse_proc_stat("intr 1\nctxt 2\n").unwrap_err();
        assert!(matches!(err, PlatformQueryError::Malformed(..)));
    }

    #[tokio::test(start_paused = true)]
    async fn measure_uses_two_readings() {
        let mut source = Scripted(VecDeque::from(vec![
            counters(0, 0),
            counters(30, 40),
        ]));
        let sample = measure_cpu(&mut source, CPU_MEASUREMENT_PAUSE).await.unwrap();
        assert!((sample.percent - 25.0).abs() < f32::EPSILON);
        assert!(source.0.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn measure_zero_delta_is_zero() {
        let frozen = counters(7, 9);
        let mut source = Scripted(VecDeque::from(vec![frozen, frozen]));
        let sample = measure_cpu(&mut source, CPU_MEASUREMENT_PAUSE).await.unwrap();
        assert_eq!(sample.percent, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn measure_propagates_source_failure() {
        let mut source = Scripted(VecDeque::new());
        assert!(measure_cpu(&mut source, CPU_MEASUREMENT_PAUSE).await.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn live_sample_is_a_percentage() {
        let sample = sample_cpu().await.unwrap();
        assert!((0.0..=100.0).contains(&sample.percent));
    }
}
