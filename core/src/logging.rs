use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a `tracing` subscriber that writes to stderr, honoring
/// `RUST_LOG`/`SLB_LOG` for filtering. Safe to call more than once; only the
/// first call wins.
pub fn init() {
    let filter = EnvFilter::try_from_env("SLB_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
