//! Ошибки окружения библиотеки: загрузка настроек и инициализация логов.
//!
//! Ошибки шины и каналов живут в крейте `subpub-error` и
//! переэкспортируются отсюда.

use std::any::Any;

use thiserror::Error;

pub use subpub_error::*;

/// Ошибки загрузки и проверки [`Settings`](crate::Settings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Источник настроек не прочитался или не разобрался.
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    /// Значение прочитано, но недопустимо.
    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Глобальный subscriber уже установлен.
    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        StatusCode::ConfigInvalid
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "settings".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::Invalid { field, .. } = self {
            tags.push(("field", field.to_string()));
        }
        tags
    }
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        StatusCode::LoggingInitFailed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
