// src/config.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::metrics::CPU_MEASUREMENT_PAUSE;

/// What shutdown does with a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Wait for the loop to finish its current iteration.
    Join,
    /// Do not wait; the loop stops by itself once it next checks the run state.
    Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Log,
    JsonLines,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    pub interval_ms: u64,
    pub policy: ShutdownPolicy,
}

impl LoopConfig {
    pub fn new(interval_ms: u64, policy: ShutdownPolicy) -> Self {
        LoopConfig {
            interval_ms,
            policy,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub interval_ms: u64,
    pub format: ReportFormat,
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub cpu: LoopConfig,              // Default: 1s, joined
    pub memory: LoopConfig,           // Default: 2s, joined
    pub disk: LoopConfig,             // Default: 5s, detached
    pub disk_path: PathBuf,           // Default: system volume root
    pub report: Option<ReportConfig>, // Default: every 1s, to the log
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            cpu: LoopConfig::new(1_000, ShutdownPolicy::Join),
            memory: LoopConfig::new(2_000, ShutdownPolicy::Join),
            // A long disk interval would hold shutdown for the rest of its wait.
            disk: LoopConfig::new(5_000, ShutdownPolicy::Detach),
            disk_path: default_disk_path(),
            report: Some(ReportConfig {
                interval_ms: 1_000,
                format: ReportFormat::Log,
            }),
        }
    }
}

#[cfg(windows)]
fn default_disk_path() -> PathBuf {
    PathBuf::from("C:\\")
}

#[cfg(not(windows))]
fn default_disk_path() -> PathBuf {
    PathBuf::from("/")
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, interval_ms) in [
            ("cpu", self.cpu.interval_ms),
            ("memory", self.memory.interval_ms),
            ("disk", self.disk.interval_ms),
        ] {
            if interval_ms == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if let Some(report) = &self.report {
            if report.interval_ms == 0 {
                return Err(ConfigError::ZeroInterval("report"));
            }
        }
        if self.disk_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDiskPath);
        }

        if self.cpu.interval() < CPU_MEASUREMENT_PAUSE {
            warn!(
                "cpu interval {}ms is shorter than the {}ms measurement pause",
                self.cpu.interval_ms,
                CPU_MEASUREMENT_PAUSE.as_millis()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroInterval(&'static str),
    EmptyDiskPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval(name) => {
                write!(f, "{} interval must be greater than zero", name)
            }
            ConfigError::EmptyDiskPath => write!(f, "disk path must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
