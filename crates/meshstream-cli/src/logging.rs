//! Log subscriber setup

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. `format` is `json` for
/// structured output; anything else gets the human-readable layer.
pub fn init_logging(level: &str, format: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("Invalid log level {level}: {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if format.eq_ignore_ascii_case("json") {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr);
        registry.with(json_layer).try_init()?;
    } else {
        let pretty_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(pretty_layer).try_init()?;
    }

    Ok(())
}
