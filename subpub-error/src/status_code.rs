use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (подписки, обработчики)
/// - 4xxx: Ограничения (переполнение очередей)
/// - 5xxx: Конфигурация и окружение
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    TypeError = 2002,

    // === 4xxx: Ограничения ===
    QueueFull = 4004,

    // === 5xxx: Конфигурация ===
    ConfigInvalid = 5100,
    LoggingInitFailed = 5101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Имеет ли смысл повторить операцию позже.
    ///
    /// Переполненная очередь освобождается, как только потребитель
    /// заберёт сообщение.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull)
    }

    /// Ошибка со стороны вызывающего кода (неверные аргументы или данные).
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=4999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound => LogLevel::Debug,
            Self::InvalidArgs | Self::TypeError => LogLevel::Info,
            Self::QueueFull => LogLevel::Warn,
            Self::Internal | Self::ConfigInvalid | Self::LoggingInitFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что переполнение очереди считается временной ошибкой.
    #[test]
    fn test_retryable() {
        assert!(StatusCode::QueueFull.is_retryable());
        assert!(!StatusCode::InvalidArgs.is_retryable());
        assert!(!StatusCode::NotFound.is_retryable());
    }

    /// Тест проверяет разделение клиентских ошибок и ошибок окружения.
    #[test]
    fn test_client_errors() {
        assert!(StatusCode::InvalidArgs.is_client_error());
        assert!(StatusCode::TypeError.is_client_error());
        assert!(StatusCode::QueueFull.is_client_error());
        assert!(!StatusCode::ConfigInvalid.is_client_error());
        assert!(!StatusCode::Internal.is_client_error());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::QueueFull.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::QueueFull);
        assert!(StatusCode::from_u32(99999).is_none());
        assert!(StatusCode::from_u32(2001).is_none());
        assert!(StatusCode::from_u32(4000).is_none());
        assert!(StatusCode::is_success(0));
    }

    /// Тест проверяет уровни логирования для разных кодов.
    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::NotFound.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::QueueFull.log_level(), LogLevel::Warn);
        assert_eq!(StatusCode::ConfigInvalid.log_level(), LogLevel::Error);
    }

    /// Тест проверяет формат `Display`: имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::NotFound);
        assert!(s.contains("2000"), "Display must contain code, got: {s}");
        assert!(s.contains("NotFound"), "Display must contain name, got: {s}");
    }
}
