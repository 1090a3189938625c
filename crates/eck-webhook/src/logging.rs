//! Console logging of the webhook server.
use snafu::{ResultExt, Snafu};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

use crate::{constants::CONSOLE_LOG_LEVEL_ENV, options::ConsoleLogFormat};

#[derive(Debug, Snafu)]
pub enum LoggingError {
    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Installs the global subscriber writing to the console. Events are filtered
/// by the directives in `CONSOLE_LOG_LEVEL`, `INFO` if unset.
pub fn init(format: ConsoleLogFormat) -> Result<(), LoggingError> {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        ConsoleLogFormat::Plain => tracing_subscriber::fmt::layer()
            .with_filter(env_filter())
            .boxed(),
        ConsoleLogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(env_filter())
            .boxed(),
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layer))
        .context(SetGlobalDefaultSubscriberSnafu)?;

    tracing::debug!(console.log.format = %format, "initialized logging");
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(CONSOLE_LOG_LEVEL_ENV)
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}
