use tracing_subscriber::EnvFilter;

use super::LoggingConfig;

/// Фильтр событий: `RUST_LOG`, если задана, иначе уровень из настроек.
/// Некорректная директива из настроек заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            // Логирование ещё не поднято, поэтому пишем напрямую в stderr.
            eprintln!("Invalid log filter directive ('{directive}'): {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}
