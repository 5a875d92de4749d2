mod cpu;
mod disk;
mod error;
mod memory;
mod sampler;
mod snapshot;
mod types;

#[cfg(target_os = "linux")]
pub use cpu::ProcStatCounters;
pub use cpu::{
    cpu_percent, measure_cpu, parse_proc_stat, sample_cpu, CpuCounterSource, CpuCounters,
    CPU_MEASUREMENT_PAUSE,
};
pub use disk::sample_disk;
pub use error::PlatformQueryError;
pub use memory::sample_memory;
pub use sampler::{CpuSampler, DiskSampler, LoopReport, MemorySampler, Sampler, SamplingLoop};
pub use snapshot::{cpu_field, disk_field, memory_field, FieldSlot, SharedSnapshot};
pub use types::{CpuSample, DiskSample, MemorySample, MetricsSnapshot, SampleEnvelope};
