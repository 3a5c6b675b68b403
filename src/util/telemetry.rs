use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing
///
/// `RUST_LOG` overrides the default `info` level. With `json` set every event is written as a
/// single JSON line, otherwise the compact text format is used.
pub fn init(json: bool) -> anyhow::Result<()> {
    // Setup tracing layers
    let env_filter = EnvFilter::try_from_default_env().or(EnvFilter::try_new("info"))?;

    if json {
        let logger = tracing_subscriber::fmt::layer().json();
        let collector = Registry::default().with(logger).with(env_filter);
        tracing::subscriber::set_global_default(collector)?;
    } else {
        let logger = tracing_subscriber::fmt::layer().compact();
        let collector = Registry::default().with(logger).with(env_filter);
        tracing::subscriber::set_global_default(collector)?;
    }
    Ok(())
}
