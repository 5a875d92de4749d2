use std::io::IsTerminal;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log formatter writing to `writer`. `RUST_LOG` overrides `default_level`.
pub fn subscriber<W>(
    default_level: &str,
    writer: W,
    ansi: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

/// Installs the global subscriber on stderr; stdout carries only reports.
///
/// `log` records from the library are bridged into the subscriber.
pub fn init(default_level: &str) {
    let colour = std::io::stderr().is_terminal();
    if let Err(err) = subscriber(default_level, std::io::stderr, colour).try_init() {
        eprintln!("logging already initialised: {}", err);
    }
}
