use std::sync::Arc;

use parking_lot::Mutex;

use super::{bus::deliver, BusConfig, EventBus, ExactIndex, Handler, RegexIndex, TopicIndex};
use crate::{singleton::SingletonRegistry, PubSubResult};

/// Потокобезопасная шина-одиночка.
///
/// Один экземпляр на тип шины в процессе, доступ через
/// [`instance`](Self::instance). Все операции над индексом выполняются под
/// мьютексом экземпляра.
///
/// Обработчики вызываются *после* освобождения мьютекса: при публикации
/// под блокировкой снимается копия списка обработчиков. Поэтому медленный
/// обработчик не задерживает подписку из других потоков, а обработчик может
/// сам подписываться и отписываться. Обратная сторона: подписка, сделанная
/// во время публикации, в эту публикацию не попадает.
pub struct ThreadSafeEventBus<P, I = ExactIndex<P>> {
    inner: Mutex<EventBus<P, I>>,
}

pub type ThreadSafeBus<P> = ThreadSafeEventBus<P, ExactIndex<P>>;

pub type ThreadSafeRegexBus<P> = ThreadSafeEventBus<P, RegexIndex<P>>;

impl<P, I> ThreadSafeEventBus<P, I>
where
    P: 'static,
    I: TopicIndex<P> + Send + 'static,
{
    fn new(config: BusConfig) -> Self {
        Self {
            inner: Mutex::new(EventBus::with_config(config)),
        }
    }

    /// Экземпляр процесса с настройками по умолчанию.
    pub fn instance() -> Arc<Self> {
        Self::instance_with(BusConfig::default())
    }

    /// Экземпляр процесса. `config` применяется, только если экземпляр
    /// создаётся этим вызовом; иначе возвращается уже существующий.
    pub fn instance_with(config: BusConfig) -> Arc<Self> {
        SingletonRegistry::global().get_or_init(|| Self::new(config))
    }

    pub fn config(&self) -> BusConfig {
        self.inner.lock().config()
    }

    pub fn set_verbose(
        &self,
        verbose: bool,
    ) {
        self.inner.lock().set_verbose(verbose);
    }

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

    /// Публикует событие; см. [`EventBus::publish`].
    pub fn publish(
        &self,
        topic: &str,
        payload: &P,
    ) -> usize {
        let (handlers, verbose) = {
            let bus = self.inner.lock();
            (bus.handlers(topic), bus.config().verbose)
        };
        deliver(topic, payload, &handlers, verbose)
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

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
