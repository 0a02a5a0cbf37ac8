use std::{collections::HashSet, sync::Arc, thread};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use super::{BusConfig, EventBus, ExactIndex, Handler, HandlerFailure, RegexIndex, TopicIndex};
use crate::PubSubResult;

/// Приёмник сбоев фоновой доставки.
pub type FailureHook = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

static FAILURE_HOOK: Lazy<RwLock<Option<FailureHook>>> = Lazy::new(|| RwLock::new(None));

/// Сбой обработчика, произошедший в фоновом потоке.
#[derive(Debug)]
pub struct DispatchFailure {
    pub topic: String,
    pub failure: HandlerFailure,
}

/// Заменяет приёмник сбоев фоновой доставки для всего процесса.
pub fn set_failure_hook<F>(hook: F)
where
    F: Fn(&DispatchFailure) + Send + Sync + 'static,
{
    *FAILURE_HOOK.write() = Some(Arc::new(hook));
}

/// Возвращает приёмник по умолчанию (лог уровня `error`).
pub fn reset_failure_hook() {
    *FAILURE_HOOK.write() = None;
}

fn report_failure(failure: DispatchFailure) {
    let hook = FAILURE_HOOK.read().clone();
    match hook {
        Some(hook) => hook(&failure),
        None => error!(
            topic = %failure.topic,
            error = %failure.failure,
            "Background handler failed"
        ),
    }
}

/// Имя фонового потока. `\0` в имени потока недопустим.
fn thread_name(topic: &str) -> String {
    format!("subpub:{}", topic.replace('\0', ""))
}

/// Шина с фоновой доставкой.
///
/// Обработчики всегда принимают `(event_name, payload)` и хранятся во
/// множестве: повторная подписка того же обработчика ничего не меняет.
/// Каждая публикация запускает по отдельному потоку на обработчик; потоки
/// не присоединяются и не отменяются, вызов `publish` их не ждёт.
/// Ошибки и паники обработчиков уходят в приёмник сбоев
/// ([`set_failure_hook`]).
pub struct ConcurrentEventBus<P, I = ExactIndex<P, HashSet<Handler<P>>>> {
    inner: Mutex<EventBus<P, I>>,
}

pub type ConcurrentBus<P> = ConcurrentEventBus<P, ExactIndex<P, HashSet<Handler<P>>>>;

pub type ConcurrentRegexBus<P> = ConcurrentEventBus<P, RegexIndex<P, HashSet<Handler<P>>>>;

impl<P, I> ConcurrentEventBus<P, I>
where
    P: Send + Sync + 'static,
    I: TopicIndex<P>,
{
    pub fn new() -> Self {
        Self::with_verbose(true)
    }

    pub fn with_verbose(verbose: bool) -> Self {
        let config = BusConfig {
            verbose,
            send_event: true,
        };
        Self {
            inner: Mutex::new(EventBus::with_config(config)),
        }
    }

    pub fn config(&self) -> BusConfig {
        self.inner.lock().config()
    }

    /// Подписывает обработчик вида `(event_name, payload)`.
    ///
    /// # Ошибки
    /// - `InvalidHandler` для обработчика вида `(payload)`.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: Handler<P>,
    ) -> PubSubResult<()> {
        self.inner.lock().subscribe(topic, handler)
    }

    pub fn unsubscribe(
        &self,
        topic: &str,
        handler: &Handler<P>,
    ) -> PubSubResult<()> {
        self.inner.lock().unsubscribe(topic, handler)
    }

    /// Запускает доставку события в фоне и сразу возвращает управление.
    ///
    /// # Возвращает
    /// - Количество запущенных потоков. Поток, который не удалось
    ///   запустить, сообщается в приёмник сбоев и не учитывается.
    pub fn publish(
        &self,
        topic: &str,
        payload: P,
    ) -> usize {
        let (handlers, verbose) = {
            let bus = self.inner.lock();
            (bus.handlers(topic), bus.config().verbose)
        };
        if handlers.is_empty() {
            debug!(topic, "No handlers for topic");
            return 0;
        }

        let payload = Arc::new(payload);
        let mut spawned = 0;
        for handler in handlers {
            let task_topic = topic.to_string();
            let task_payload = Arc::clone(&payload);
            let task = thread::Builder::new()
                .name(thread_name(topic))
                .spawn(move || {
                    if let Err(failure) = handler.invoke(&task_topic, &task_payload) {
                        report_failure(DispatchFailure {
                            topic: task_topic,
                            failure,
                        });
                    }
                });

            match task {
                Ok(_) => spawned += 1,
                Err(err) => report_failure(DispatchFailure {
                    topic: topic.to_string(),
                    failure: HandlerFailure::Spawn(err),
                }),
            }
        }

        if verbose {
            info!(topic, tasks = spawned, "Event dispatched");
        }
        spawned
    }

    pub fn has_subscribers(
        &self,
        topic: &str,
    ) -> bool {
        self.inner.lock().has_subscribers(topic)
    }

    pub fn handler_count(
        &self,
        topic: &str,
    ) -> usize {
        self.inner.lock().handler_count(topic)
    }

    pub fn topics(&self) -> Vec<String> {
        self.inner.lock().topics()
    }
}

impl<P, I> Default for ConcurrentEventBus<P, I>
where
    P: Send + Sync + 'static,
    I: TopicIndex<P>,
{
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
