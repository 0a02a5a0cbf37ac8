use std::{
    any::Any,
    fmt,
    hash::{Hash, Hasher},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use thiserror::Error;

use crate::{PubSubError, PubSubResult};

/// Результат, который возвращает обработчик события.
pub type HandlerResult = anyhow::Result<()>;

type PayloadFn<P> = dyn Fn(&P) -> HandlerResult + Send + Sync;
type EventFn<P> = dyn Fn(&str, &P) -> HandlerResult + Send + Sync;

/// Объявленная форма обработчика.
///
/// Заменяет проверку сигнатуры во время выполнения: шина знает, какую форму
/// ожидает, и отклоняет обработчик другой формы при подписке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// `(payload)`
    Payload,
    /// `(event_name, payload)`
    Event,
}

impl HandlerKind {
    /// Число параметров обработчика.
    pub const fn arity(self) -> usize {
        match self {
            Self::Payload => 1,
            Self::Event => 2,
        }
    }

    /// Форма, которую ожидает шина с данным значением `send_event`.
    pub const fn for_send_event(send_event: bool) -> Self {
        if send_event {
            Self::Event
        } else {
            Self::Payload
        }
    }
}

enum Callback<P> {
    Payload(Arc<PayloadFn<P>>),
    Event(Arc<EventFn<P>>),
}

/// Зарегистрированный обработчик события.
///
/// Идентичность обработчика определяется его аллокацией: клоны одного `Handler`
/// равны друг другу, два обработчика из одинаковых замыканий не равны.
/// Отписка выполняется по клону, полученному при подписке.
pub struct Handler<P> {
    callback: Callback<P>,
}

/// Сбой при вызове обработчика.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// Обработчик вернул ошибку.
    #[error("handler returned an error: {0:#}")]
    Error(anyhow::Error),
    /// Обработчик запаниковал.
    #[error("handler panicked: {0}")]
    Panic(String),
    /// Не удалось запустить фоновый поток.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<P> Handler<P> {
    /// Обработчик вида `(payload)`.
    pub fn payload<F>(f: F) -> Self
    where
        F: Fn(&P) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callback: Callback::Payload(Arc::new(f)),
        }
    }

    /// Обработчик вида `(event_name, payload)`.
    pub fn event<F>(f: F) -> Self
    where
        F: Fn(&str, &P) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callback: Callback::Event(Arc::new(f)),
        }
    }

    pub fn kind(&self) -> HandlerKind {
        match self.callback {
            Callback::Payload(_) => HandlerKind::Payload,
            Callback::Event(_) => HandlerKind::Event,
        }
    }

    pub fn arity(&self) -> usize {
        self.kind().arity()
    }

    /// Проверяет, что форма обработчика совпадает с ожидаемой.
    pub(crate) fn validate(
        &self,
        topic: &str,
        expected: HandlerKind,
    ) -> PubSubResult<()> {
        if self.kind() == expected {
            return Ok(());
        }
        Err(PubSubError::InvalidHandler {
            topic: topic.to_string(),
            expected: expected.arity(),
            found: self.arity(),
        })
    }

    /// Вызывает обработчик, перехватывая и ошибку, и панику.
    pub(crate) fn invoke(
        &self,
        topic: &str,
        payload: &P,
    ) -> Result<(), HandlerFailure> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &self.callback {
            Callback::Payload(f) => f(payload),
            Callback::Event(f) => f(topic, payload),
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(HandlerFailure::Error(err)),
            Err(panic) => Err(HandlerFailure::Panic(panic_message(panic.as_ref()))),
        }
    }

    fn addr(&self) -> *const () {
        match &self.callback {
            Callback::Payload(f) => Arc::as_ptr(f) as *const (),
            Callback::Event(f) => Arc::as_ptr(f) as *const (),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Handler
////////////////////////////////////////////////////////////////////////////////

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        let callback = match &self.callback {
            Callback::Payload(f) => Callback::Payload(Arc::clone(f)),
            Callback::Event(f) => Callback::Event(Arc::clone(f)),
        };
        Self { callback }
    }
}

impl<P> PartialEq for Handler<P> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.addr() == other.addr()
    }
}

impl<P> Eq for Handler<P> {}

impl<P> Hash for Handler<P> {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.addr().hash(state);
    }
}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind())
            .field("addr", &self.addr())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;

    use super::*;

    /// Тест проверяет арность объявленных форм обработчика.
    #[test]
    fn test_kind_and_arity() {
        let h = Handler::<u32>::payload(|_| Ok(()));
        assert_eq!(h.kind(), HandlerKind::Payload);
        assert_eq!(h.arity(), 1);

        let h = Handler::<u32>::event(|_, _| Ok(()));
        assert_eq!(h.kind(), HandlerKind::Event);
        assert_eq!(h.arity(), 2);

        assert_eq!(HandlerKind::for_send_event(true), HandlerKind::Event);
        assert_eq!(HandlerKind::for_send_event(false), HandlerKind::Payload);
    }

    /// Тест проверяет, что клоны равны, а одинаковые замыкания различны.
    #[test]
    fn test_identity_by_allocation() {
        let a = Handler::<u32>::payload(|_| Ok(()));
        let b = Handler::<u32>::payload(|_| Ok(()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    /// Тест проверяет, что проверка формы возвращает `InvalidHandler` с
    /// ожидаемой и фактической арностью.
    #[test]
    fn test_validate_mismatch() {
        let h = Handler::<u32>::payload(|_| Ok(()));
        assert!(h.validate("t", HandlerKind::Payload).is_ok());
        assert_eq!(
            h.validate("t", HandlerKind::Event),
            Err(PubSubError::InvalidHandler {
                topic: "t".into(),
                expected: 2,
                found: 1,
            })
        );
    }

    /// Тест проверяет, что обработчик получает имя события и payload.
    #[test]
    fn test_invoke_passes_arguments() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let h = Handler::<usize>::event(move |event, payload| {
            assert_eq!(event, "sum");
            s.fetch_add(*payload, Ordering::SeqCst);
            Ok(())
        });
        h.invoke("sum", &5).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    /// Тест проверяет, что ошибка и паника обработчика перехватываются.
    #[test]
    fn test_invoke_contains_failures() {
        let failing = Handler::<u32>::payload(|_| Err(anyhow!("boom")));
        match failing.invoke("t", &1) {
            Err(HandlerFailure::Error(e)) => assert_eq!(e.to_string(), "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let panicking = Handler::<u32>::payload(|_| panic!("kaboom"));
        match panicking.invoke("t", &1) {
            Err(HandlerFailure::Panic(msg)) => assert_eq!(msg, "kaboom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
