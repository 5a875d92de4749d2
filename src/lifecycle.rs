use std::future::Future;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, MonitorConfig, ShutdownPolicy};
use crate::metrics::{
    cpu_field, disk_field, memory_field, CpuSample, CpuSampler, DiskSample, DiskSampler,
    LoopReport, MemorySample, MemorySampler, Sampler, SamplingLoop, SharedSnapshot,
};
use crate::report::{sink_for, ReportSink, ReportingLoop};

/// Shared running/stopped flag observed by every loop.
///
/// Stopping is one-way: once `stop` has been called the state never
/// returns to running.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    token: CancellationToken,
}

impl RunState {
    pub fn new() -> Self {
        RunState {
            token: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}

/// A loop that is abandoned at shutdown.
///
/// The task handle is dropped as soon as the loop is spawned, so nothing can
/// ever wait on it. The loop exits on its own the next time it sees the
/// stopped run state, which may be after shutdown has returned.
#[derive(Debug)]
pub struct Detached {
    name: &'static str,
}

impl Detached {
    pub fn spawn<F>(name: &'static str, task: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        drop(tokio::spawn(task));
        Detached { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub enum LoopHandle {
    Joinable {
        name: &'static str,
        handle: JoinHandle<LoopReport>,
    },
    Detached(Detached),
}

impl LoopHandle {
    pub fn spawn<F>(name: &'static str, policy: ShutdownPolicy, task: F) -> Self
    where
        F: Future<Output = LoopReport> + Send + 'static,
    {
        match policy {
            ShutdownPolicy::Join => LoopHandle::Joinable {
                name,
                handle: tokio::spawn(task),
            },
            ShutdownPolicy::Detach => LoopHandle::Detached(Detached::spawn(name, task)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoopHandle::Joinable { name, .. } => name,
            LoopHandle::Detached(detached) => detached.name(),
        }
    }
}

/// The three samplers a monitor drives, one per snapshot field.
pub struct SamplerSet<C, M, D> {
    pub cpu: C,
    pub memory: M,
    pub disk: D,
}

impl SamplerSet<CpuSampler, MemorySampler, DiskSampler> {
    pub fn system(config: &MonitorConfig) -> Self {
        SamplerSet {
            cpu: CpuSampler,
            memory: MemorySampler,
            disk: DiskSampler::new(config.disk_path.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Joinable loops, confirmed finished.
    pub joined: Vec<LoopReport>,
    /// Joinable loops whose task panicked or was cancelled.
    pub failed: Vec<(&'static str, String)>,
    /// Loops that were not waited for.
    pub detached: Vec<&'static str>,
}

pub struct Monitor;

impl Monitor {
    pub fn start(config: MonitorConfig) -> Result<RunningMonitor, ConfigError> {
        let samplers = SamplerSet::system(&config);
        let sink = config.report.as_ref().map(|report| sink_for(report.format));
        Self::start_with(config, samplers, sink)
    }

    /// Spawns one loop per sampler, plus the reporting loop when the config
    /// enables it and a sink is given. Must be called inside a tokio runtime.
    pub fn start_with<C, M, D>(
        config: MonitorConfig,
        samplers: SamplerSet<C, M, D>,
        sink: Option<Box<dyn ReportSink>>,
    ) -> Result<RunningMonitor, ConfigError>
    where
        C: Sampler<Output = CpuSample>,
        M: Sampler<Output = MemorySample>,
        D: Sampler<Output = DiskSample>,
    {
        config.validate()?;

        let run_state = RunState::new();
        let snapshot = SharedSnapshot::new();
        let mut handles = Vec::with_capacity(4);

        let SamplerSet { cpu, memory, disk } = samplers;

        let name = cpu.name();
        let task = SamplingLoop::new(
            cpu,
            config.cpu.interval(),
            run_state.clone(),
            snapshot.clone(),
            cpu_field,
        );
        handles.push(LoopHandle::spawn(name, config.cpu.policy, task.run()));

        let name = memory.name();
        let task = SamplingLoop::new(
            memory,
            config.memory.interval(),
            run_state.clone(),
            snapshot.clone(),
            memory_field,
        );
        handles.push(LoopHandle::spawn(name, config.memory.policy, task.run()));

        let name = disk.name();
        let task = SamplingLoop::new(
            disk,
            config.disk.interval(),
            run_state.clone(),
            snapshot.clone(),
            disk_field,
        );
        handles.push(LoopHandle::spawn(name, config.disk.policy, task.run()));

        if let (Some(report), Some(sink)) = (config.report.as_ref(), sink) {
            let task = ReportingLoop::new(
                report.interval(),
                run_state.clone(),
                snapshot.clone(),
                sink,
            );
            handles.push(LoopHandle::spawn("report", ShutdownPolicy::Join, task.run()));
        }

        for handle in &handles {
            let policy = match handle {
                LoopHandle::Joinable { .. } => "joinable",
                LoopHandle::Detached(_) => "detached",
            };
            info!("{} loop started ({})", handle.name(), policy);
        }

        Ok(RunningMonitor {
            run_state,
            snapshot,
            handles,
        })
    }
}

pub struct RunningMonitor {
    run_state: RunState,
    snapshot: SharedSnapshot,
    handles: Vec<LoopHandle>,
}

impl RunningMonitor {
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.clone()
    }

    /// Stops every loop, waits for the joinable ones and abandons the rest.
    pub async fn shutdown(self) -> ShutdownReport {
        self.run_state.stop();

        let mut report = ShutdownReport::default();
        let mut pending = Vec::new();
        for handle in self.handles {
            match handle {
                LoopHandle::Joinable { name, handle } => pending.push(async move {
                    (name, handle.await)
                }),
                LoopHandle::Detached(detached) => {
                    debug!("not waiting for detached {} loop", detached.name());
                    report.detached.push(detached.name());
                }
            }
        }

        for (name, outcome) in join_all(pending).await {
            match outcome {
                Ok(summary) => report.joined.push(summary),
                Err(err) => {
                    warn!("{} loop did not finish cleanly: {}", name, err);
                    report.failed.push((name, err.to_string()));
                }
            }
        }

        info!(
            "monitor stopped: {} joined, {} failed, {} detached",
            report.joined.len(),
            report.failed.len(),
            report.detached.len()
        );
        report
    }
}

/// Starts the monitor, waits for `stop` to resolve and shuts down.
pub async fn run<F>(config: MonitorConfig, stop: F) -> Result<ShutdownReport, ConfigError>
where
    F: Future<Output = ()>,
{
    let monitor = Monitor::start(config)?;
    stop.await;
    Ok(monitor.shutdown().await)
}

/// Resolves on the first line read from stdin or on Ctrl-C.
///
/// A closed or unreadable stdin is not a stop request; Ctrl-C still is.
pub async fn stop_trigger() {
    stop_on(watch_stdin(), tokio::signal::ctrl_c()).await
}

async fn stop_on<I>(line: oneshot::Receiver<()>, interrupt: I)
where
    I: Future<Output = std::io::Result<()>>,
{
    let from_stdin = async {
        if line.await.is_ok() {
            info!("stop requested from stdin");
        } else {
            debug!("stdin closed, waiting for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = from_stdin => {}
        result = interrupt => match result {
            Ok(()) => info!("received Ctrl-C"),
            Err(err) => warn!("failed to listen for Ctrl-C: {}", err),
        },
    }
}

// Blocking stdin reads run on a plain thread so they never hold up runtime
// shutdown.
fn watch_stdin() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-stop".to_string())
        .spawn(move || {
            let mut line = String::new();
            if let Ok(read) = std::io::stdin().read_line(&mut line) {
                if read > 0 {
                    let _ = tx.send(());
                }
            }
        });
    if let Err(err) = spawned {
        warn!("could not watch stdin: {}", err);
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[test]
    fn run_state_is_one_way() {
        let state = RunState::new();
        let observer = state.clone();
        assert!(!observer.is_stopped());
        state.stop();
        assert!(observer.is_stopped());
        state.stop();
        assert!(observer.is_stopped());
    }

    #[tokio::test]
    async fn stopped_resolves_after_stop() {
        let state = RunState::new();
        let waiter = state.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });
        state.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn detached_task_still_runs() {
        let (tx, rx) = oneshot::channel();
        let detached = Detached::spawn("side-task", async move {
            let _ = tx.send(7u8);
        });
        assert_eq!(detached.name(), "side-task");
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn line_on_stdin_stops() {
        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();
        timeout(Duration::from_secs(1), stop_on(rx, std::future::pending()))
            .await
            .expect("a line must stop the monitor");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stdin_keeps_running() {
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let waited = timeout(Duration::from_secs(60), stop_on(rx, std::future::pending())).await;
        assert!(waited.is_err(), "EOF on stdin must not stop the monitor");
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_after_stdin_closed() {
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let interrupt = async {
            sleep(Duration::from_secs(5)).await;
            Ok::<(), std::io::Error>(())
        };
        timeout(Duration::from_secs(10), stop_on(rx, interrupt))
            .await
            .expect("Ctrl-C must stop the monitor");
    }
}
