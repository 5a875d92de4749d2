use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use host_sampler_lib::{
    logging, run, stop_trigger, MonitorConfig, ReportConfig, ReportFormat, ShutdownPolicy,
};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "host-sampler", about = "Samples CPU, memory and disk usage until stopped")]
struct Cli {
    /// CPU sampling interval in milliseconds
    #[arg(long, default_value_t = 1_000)]
    cpu_interval_ms: u64,

    /// Memory sampling interval in milliseconds
    #[arg(long, default_value_t = 2_000)]
    memory_interval_ms: u64,

    /// Disk sampling interval in milliseconds
    #[arg(long, default_value_t = 5_000)]
    disk_interval_ms: u64,

    /// Reporting interval in milliseconds
    #[arg(long, default_value_t = 1_000)]
    report_interval_ms: u64,

    /// Volume to report disk usage for
    #[arg(long)]
    disk_path: Option<PathBuf>,

    /// Do not print reports
    #[arg(long)]
    no_report: bool,

    /// Print reports as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Wait for the disk loop on shutdown instead of detaching it
    #[arg(long)]
    join_disk: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.cpu.interval_ms = self.cpu_interval_ms;
        config.memory.interval_ms = self.memory_interval_ms;
        config.disk.interval_ms = self.disk_interval_ms;
        if self.join_disk {
            config.disk.policy = ShutdownPolicy::Join;
        }
        if let Some(path) = self.disk_path {
            config.disk_path = path;
        }
        config.report = if self.no_report {
            None
        } else {
            Some(ReportConfig {
                interval_ms: self.report_interval_ms,
                format: if self.json {
                    ReportFormat::JsonLines
                } else {
                    ReportFormat::Log
                },
            })
        };
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = cli.into_config();
    info!(
        "sampling {} (cpu every {}ms, memory every {}ms, disk every {}ms)",
        config.disk_path.display(),
        config.cpu.interval_ms,
        config.memory.interval_ms,
        config.disk.interval_ms
    );
    info!("press Enter or Ctrl-C to stop");

    match run(config, stop_trigger()).await {
        Ok(report) => {
            info!(
                "all joinable loops stopped ({} joined, {} detached)",
                report.joined.len(),
                report.detached.len()
            );
            if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("invalid configuration: {}", err);
            ExitCode::from(2)
        }
    }
}
