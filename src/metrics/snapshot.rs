use std::sync::Arc;

use tokio::sync::Mutex;

use super::types::{CpuSample, DiskSample, MemorySample, MetricsSnapshot, SampleEnvelope};

/// Selects the one field of the snapshot a sampling loop owns.
pub type FieldSlot<T> = fn(&mut MetricsSnapshot) -> &mut SampleEnvelope<T>;

pub fn cpu_field(snapshot: &mut MetricsSnapshot) -> &mut SampleEnvelope<CpuSample> {
    &mut snapshot.cpu
}

pub fn memory_field(snapshot: &mut MetricsSnapshot) -> &mut SampleEnvelope<MemorySample> {
    &mut snapshot.memory
}

pub fn disk_field(snapshot: &mut MetricsSnapshot) -> &mut SampleEnvelope<DiskSample> {
    &mut snapshot.disk
}

/// Handle to the single snapshot shared by every loop.
///
/// All access goes through one exclusive lock. Critical sections only move
/// values in or out; sampling and formatting happen outside of it.
#[derive(Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        SharedSnapshot {
            inner: Arc::new(Mutex::new(MetricsSnapshot::stale())),
        }
    }

    /// Copies the current state out from under the lock.
    pub async fn latest(&self) -> MetricsSnapshot {
        self.inner.lock().await.clone()
    }

    pub async fn update<T, F>(&self, slot: FieldSlot<T>, apply: F)
    where
        F: FnOnce(&mut SampleEnvelope<T>),
    {
        let mut guard = self.inner.lock().await;
        apply(slot(&mut guard));
    }
}
