use sysinfo::System;

use super::error::PlatformQueryError;
use super::types::MemorySample;

pub const MEMORY_SOURCE: &str = "sysinfo::memory";

/// Physical memory in use right now.
pub fn sample_memory() -> Result<MemorySample, PlatformQueryError> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(PlatformQueryError::Unsupported("physical memory accounting"));
    }

    let mut system = System::new();
    system.refresh_memory();
    Ok(MemorySample::from_totals(
        system.total_memory(),
        system.available_memory(),
    ))
}
