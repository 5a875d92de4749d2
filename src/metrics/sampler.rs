use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use tokio::select;
use tokio::time::{interval, MissedTickBehavior};

use crate::lifecycle::RunState;

use super::cpu::{sample_cpu, CPU_SOURCE};
use super::disk::{sample_disk, DISK_SOURCE};
use super::error::PlatformQueryError;
use super::memory::{sample_memory, MEMORY_SOURCE};
use super::snapshot::{FieldSlot, SharedSnapshot};
use super::types::{CpuSample, DiskSample, MemorySample};

/// One metric source. `sample` may block its caller for a while (the CPU
/// sampler always does), but never waits on another loop.
#[async_trait]
pub trait Sampler: Send + 'static {
    type Output: Default + Send + 'static;

    fn name(&self) -> &'static str;

    fn source(&self) -> &'static str;

    async fn sample(&mut self) -> Result<Self::Output, PlatformQueryError>;
}

pub struct CpuSampler;

#[async_trait]
impl Sampler for CpuSampler {
    type Output = CpuSample;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn source(&self) -> &'static str {
        CPU_SOURCE
    }

    async fn sample(&mut self) -> Result<CpuSample, PlatformQueryError> {
        sample_cpu().await
    }
}

pub struct MemorySampler;

#[async_trait]
impl Sampler for MemorySampler {
    type Output = MemorySample;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn source(&self) -> &'static str {
        MEMORY_SOURCE
    }

    async fn sample(&mut self) -> Result<MemorySample, PlatformQueryError> {
        sample_memory()
    }
}

pub struct DiskSampler {
    path: PathBuf,
}

impl DiskSampler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DiskSampler { path: path.into() }
    }
}

#[async_trait]
impl Sampler for DiskSampler {
    type Output = DiskSample;

    fn name(&self) -> &'static str {
        "disk"
    }

    fn source(&self) -> &'static str {
        DISK_SOURCE
    }

    // An unresponsive volume stalls this loop only, not a runtime worker.
    async fn sample(&mut self) -> Result<DiskSample, PlatformQueryError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || sample_disk(&path))
            .await
            .map_err(|err| {
                PlatformQueryError::Io(
                    "disk query task",
                    std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                )
            })?
    }
}

/// Outcome of a loop that ran to completion.
#[derive(Clone, Debug, Serialize)]
pub struct LoopReport {
    pub name: &'static str,
    pub iterations: u64,
    pub errors: u64,
}

impl LoopReport {
    pub fn new(name: &'static str) -> Self {
        LoopReport {
            name,
            iterations: 0,
            errors: 0,
        }
    }
}

/// Samples one metric on a fixed cadence and writes it into its field.
pub struct SamplingLoop<S: Sampler> {
    sampler: S,
    period: Duration,
    run_state: RunState,
    snapshot: SharedSnapshot,
    slot: FieldSlot<S::Output>,
}

impl<S: Sampler> SamplingLoop<S> {
    pub fn new(
        sampler: S,
        period: Duration,
        run_state: RunState,
        snapshot: SharedSnapshot,
        slot: FieldSlot<S::Output>,
    ) -> Self {
        SamplingLoop {
            sampler,
            period,
            run_state,
            snapshot,
            slot,
        }
    }

    /// Runs until the run state is stopped.
    ///
    /// The stop request is seen while waiting for the next tick. A sample
    /// already in progress completes and is written before the loop exits.
    pub async fn run(mut self) -> LoopReport {
        let name = self.sampler.name();
        let source = self.sampler.source();
        let mut report = LoopReport::new(name);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                biased;
                _ = self.run_state.stopped() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let result = self.sampler.sample().await;
            let latency = started.elapsed();
            report.iterations += 1;

            match result {
                Ok(value) => {
                    self.snapshot
                        .update(self.slot, |field| field.record_fresh(value, latency, source))
                        .await;
                }
                Err(err) => {
                    warn!("{} sampler error: {}", name, err);
                    report.errors += 1;
                    self.snapshot
                        .update(self.slot, |field| field.record_error(&err, latency, source))
                        .await;
                }
            }
        }

        debug!(
            "{} loop stopped after {} iterations ({} errors)",
            name, report.iterations, report.errors
        );
        report
    }
}
