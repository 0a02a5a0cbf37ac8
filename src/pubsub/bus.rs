use std::marker::PhantomData;

use tracing::{debug, error, info};

use super::{ExactIndex, Handler, HandlerKind, HandlerSet, RegexIndex, TopicIndex};
use crate::{PubSubError, PubSubResult};

/// Настройки шины событий.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Писать ли строку лога на каждую успешную операцию.
    /// На доставку не влияет.
    pub verbose: bool,
    /// Передавать ли обработчику имя события вместе с payload.
    /// Определяет ожидаемую форму обработчика.
    pub send_event: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            send_event: false,
        }
    }
}

impl BusConfig {
    pub fn expected_kind(&self) -> HandlerKind {
        HandlerKind::for_send_event(self.send_event)
    }
}

/// Шина событий с синхронным вызовом обработчиков.
///
/// Каждый экземпляр владеет собственным индексом тем; общего состояния
/// между экземплярами нет. Для совместного использования из нескольких
/// потоков есть [`ThreadSafeEventBus`](super::ThreadSafeEventBus).
pub struct EventBus<P, I = ExactIndex<P>> {
    index: I,
    config: BusConfig,
    _payload: PhantomData<fn(&P)>,
}

/// Шина с точным совпадением темы.
pub type SimpleBus<P> = EventBus<P, ExactIndex<P>>;

/// Шина с поиском темы по регулярному выражению (см. [`RegexIndex`]).
pub type RegexBus<P> = EventBus<P, RegexIndex<P>>;

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<P, I: TopicIndex<P>> EventBus<P, I> {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            index: I::default(),
            config,
            _payload: PhantomData,
        }
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    pub fn set_verbose(
        &mut self,
        verbose: bool,
    ) {
        self.config.verbose = verbose;
    }

    /// Регистрирует обработчик для темы.
    ///
    /// # Ошибки
    /// - `InvalidHandler`, если форма обработчика не совпадает с
    ///   ожидаемой (`send_event`).
    pub fn subscribe(
        &mut self,
        topic: &str,
        handler: Handler<P>,
    ) -> PubSubResult<()> {
        handler.validate(topic, self.config.expected_kind())?;
        self.index.entry(topic).insert(handler);

        if self.config.verbose {
            info!(topic, "Handler subscribed");
        }
        Ok(())
    }

    /// Снимает одну регистрацию обработчика с темы.
    ///
    /// # Ошибки
    /// - `NotSubscribed`, если тема неизвестна или обработчик на неё не
    ///   подписан.
    pub fn unsubscribe(
        &mut self,
        topic: &str,
        handler: &Handler<P>,
    ) -> PubSubResult<()> {
        let removed = self
            .index
            .get_mut(topic)
            .is_some_and(|set| set.remove(handler));
        if !removed {
            return Err(PubSubError::NotSubscribed {
                topic: topic.to_string(),
            });
        }

        if self.config.verbose {
            info!(topic, "Handler unsubscribed");
        }
        Ok(())
    }

    /// Публикует событие. Никогда не завершается ошибкой.
    ///
    /// Обработчики вызываются по порядку регистрации; ошибка или паника
    /// одного из них логируется и не мешает остальным.
    ///
    /// # Возвращает
    /// - Количество вызванных обработчиков.
    pub fn publish(
        &self,
        topic: &str,
        payload: &P,
    ) -> usize {
        let handlers = self.index.lookup(topic);
        deliver(topic, payload, &handlers, self.config.verbose)
    }

    /// Обработчики, которые получили бы событие `topic`.
    pub fn handlers(
        &self,
        topic: &str,
    ) -> Vec<Handler<P>> {
        self.index.lookup(topic)
    }

    pub fn has_subscribers(
        &self,
        topic: &str,
    ) -> bool {
        !self.handlers(topic).is_empty()
    }

    /// Число регистраций под ключом `topic` (точное совпадение ключа).
    pub fn handler_count(
        &self,
        topic: &str,
    ) -> usize {
        self.index.get(topic).map_or(0, |set| set.len())
    }

    pub fn topics(&self) -> Vec<String> {
        self.index.topics()
    }
}

impl<P, I: TopicIndex<P>> Default for EventBus<P, I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Синхронно вызывает обработчики, перехватывая их сбои.
pub(crate) fn deliver<P>(
    topic: &str,
    payload: &P,
    handlers: &[Handler<P>],
    verbose: bool,
) -> usize {
    if handlers.is_empty() {
        debug!(topic, "No handlers for topic");
        return 0;
    }

    for handler in handlers {
        if let Err(failure) = handler.invoke(topic, payload) {
            error!(topic, error = %failure, "Handler failed");
        }
    }

    if verbose {
        info!(topic, handlers = handlers.len(), "Event published");
    }
    handlers.len()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
