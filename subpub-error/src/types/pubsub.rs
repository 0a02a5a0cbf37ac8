use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки шины событий и модели каналов.
///
/// Все варианты локальные и синхронные: возвращаются сразу из вызова,
/// повторных попыток внутри библиотеки нет.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    /// Обработчик объявлен с другим числом параметров, чем ожидает шина.
    #[error("Invalid handler for '{topic}': expected {expected} parameter(s), found {found}")]
    InvalidHandler {
        topic: String,
        expected: usize,
        found: usize,
    },
    /// Пара (тема, обработчик) не зарегистрирована.
    #[error("Handler is not subscribed to '{topic}'")]
    NotSubscribed { topic: String },
    /// Некорректные аргументы (пустой список каналов, нулевая ёмкость).
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
    /// Очередь подписчика заполнена.
    #[error("Subscriber queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

impl PubSubError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidHandler { .. } => StatusCode::TypeError,
            Self::NotSubscribed { .. } => StatusCode::NotFound,
            Self::InvalidArgument { .. } => StatusCode::InvalidArgs,
            Self::QueueFull { .. } => StatusCode::QueueFull,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidHandler { expected, .. } => {
                format!("Handler must take {expected} parameter(s)")
            }
            Self::NotSubscribed { topic } => format!("Not subscribed to {topic}"),
            Self::InvalidArgument { .. } => self.to_string(),
            Self::QueueFull { .. } => "Subscriber queue is full".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::InvalidHandler { topic, .. } | Self::NotSubscribed { topic } => {
                tags.push(("topic", topic.clone()));
            }
            Self::QueueFull { capacity } => {
                tags.push(("capacity", capacity.to_string()));
            }
            Self::InvalidArgument { .. } => {}
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет соответствие вариантов ошибок кодам статуса.
    #[test]
    fn test_status_codes() {
        let err = PubSubError::InvalidHandler {
            topic: "t".into(),
            expected: 2,
            found: 1,
        };
        assert_eq!(err.status_code(), StatusCode::TypeError);
        assert_eq!(
            PubSubError::NotSubscribed { topic: "t".into() }.status_code(),
            StatusCode::NotFound
        );
        assert_eq!(
            PubSubError::invalid_argument("empty").status_code(),
            StatusCode::InvalidArgs
        );
        assert_eq!(
            PubSubError::QueueFull { capacity: 3 }.status_code(),
            StatusCode::QueueFull
        );
    }

    /// Тест проверяет текст ошибки с арностью обработчика.
    #[test]
    fn test_invalid_handler_display() {
        let err = PubSubError::InvalidHandler {
            topic: "orders".into(),
            expected: 2,
            found: 1,
        };
        let s = err.to_string();
        assert!(s.contains("orders"));
        assert!(s.contains("expected 2"));
        assert!(s.contains("found 1"));
    }

    /// Тест проверяет теги метрик для переполненной очереди.
    #[test]
    fn test_queue_full_tags() {
        let err = PubSubError::QueueFull { capacity: 150 };
        let tags = err.metrics_tags();
        assert!(tags.iter().any(|(k, v)| k == &"capacity" && v == "150"));
        assert!(tags.iter().any(|(k, v)| k == &"error_type" && v == "pubsub"));
        assert_eq!(err.client_message(), "Subscriber queue is full");
    }
}
