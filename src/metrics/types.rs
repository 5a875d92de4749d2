use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::PlatformQueryError;

const UNINITIALIZED: &str = "uninitialized";

/// Latest value of one snapshot field plus when and how it was obtained.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleEnvelope<T> {
    pub value: T,
    pub collected_at: DateTime<Utc>,
    pub latency_ms: u32,
    pub source: String,
    pub error: Option<String>,
    pub generation: u64,
}

impl<T: Default> SampleEnvelope<T> {
    pub fn stale(now: DateTime<Utc>) -> Self {
        SampleEnvelope {
            value: T::default(),
            collected_at: now,
            latency_ms: 0,
            source: UNINITIALIZED.to_string(),
            error: None,
            generation: 0,
        }
    }

    pub fn record_fresh(&mut self, value: T, latency: Duration, source: &str) {
        self.value = value;
        self.error = None;
        self.stamp(latency, source);
    }

    /// Replaces the value with the zero sample and keeps the error text.
    pub fn record_error(&mut self, error: &PlatformQueryError, latency: Duration, source: &str) {
        self.value = T::default();
        self.error = Some(error.to_string());
        self.stamp(latency, source);
    }

    fn stamp(&mut self, latency: Duration, source: &str) {
        self.collected_at = Utc::now();
        self.latency_ms = latency.as_millis().min(u32::MAX as u128) as u32;
        if self.source != source {
            self.source = source.to_string();
        }
        self.generation += 1;
    }

    pub fn is_initialized(&self) -> bool {
        self.generation > 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub percent: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_percent: f32,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn from_totals(total: u64, available: u64) -> Self {
        let used = total.saturating_sub(available);
        MemorySample {
            used_percent: percent_of(used, total),
            used_bytes: used,
            total_bytes: total,
        }
    }

    pub fn used_mb(&self) -> u64 {
        self.used_bytes / (1024 * 1024)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskSample {
    pub used_percent: f32,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSample {
    pub fn from_totals(total: u64, free: u64) -> Self {
        let used = total.saturating_sub(free);
        DiskSample {
            used_percent: percent_of(used, total),
            used_bytes: used,
            total_bytes: total,
        }
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub(crate) fn percent_of(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Freshest available value of every metric.
///
/// Fields are written independently, so two fields may come from different
/// points in time. Compare `collected_at` when that matters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu: SampleEnvelope<CpuSample>,
    pub memory: SampleEnvelope<MemorySample>,
    pub disk: SampleEnvelope<DiskSample>,
}

impl MetricsSnapshot {
    pub fn stale() -> Self {
        let now = Utc::now();
        MetricsSnapshot {
            cpu: SampleEnvelope::stale(now),
            memory: SampleEnvelope::stale(now),
            disk: SampleEnvelope::stale(now),
        }
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        MetricsSnapshot::stale()
    }
}
