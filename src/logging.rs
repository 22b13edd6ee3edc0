use pressroom_config::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info,pressroom=debug";

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=pressroom_transform=trace pressroom serve`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Compact => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json().with_current_span(true))
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logging already initialised: {e}");
    }
}
