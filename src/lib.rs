pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod report;

pub use config::{
    ConfigError, LoopConfig, MonitorConfig, ReportConfig, ReportFormat, ShutdownPolicy,
};
pub use lifecycle::{
    run, stop_trigger, Detached, LoopHandle, Monitor, RunState, RunningMonitor, SamplerSet,
    ShutdownReport,
};
pub use report::{format_report, JsonLinesSink, LogSink, ReportSink, ReportingLoop};
