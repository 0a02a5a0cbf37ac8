pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use formatter::{build_formatter, build_formatter_with_writer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Устанавливает глобальный subscriber по настройкам.
///
/// # Ошибки
/// - `AlreadyInitialized`, если глобальный subscriber уже установлен.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = filters::build_filter_from_config(config);
    let formatter = formatter::build_formatter(config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}
