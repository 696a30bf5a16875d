//! Logging setup for the function process.

use tower::BoxError;
use tracing_subscriber::EnvFilter;

use crate::configuration::RuntimeMode;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber: JSON lines in production, human readable lines otherwise.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Calling this more than once, or
/// after another subscriber was installed, is an error.
pub fn init(mode: RuntimeMode) -> Result<(), BoxError> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let builder = tracing_subscriber::fmt::fmt().with_env_filter(EnvFilter::try_new(&env_filter)?);
    match mode {
        RuntimeMode::Production => builder.json().with_current_span(true).try_init(),
        RuntimeMode::Development => builder.compact().try_init(),
    }
}
