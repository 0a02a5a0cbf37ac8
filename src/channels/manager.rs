use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dashmap::DashMap;
use tracing::debug;

use super::{Channel, Subscriber, SubscriberId};
use crate::singleton::SingletonRegistry;

/// Реестр каналов: имя → [`Channel`].
///
/// Каналы создаются при первом обращении по имени и живут, пока жив
/// менеджер. Обычно подписчики работают с глобальным менеджером процесса
/// ([`ChannelManager::global`]); изолированный менеджер создаётся через
/// [`ChannelManager::new`].
pub struct ChannelManager<M> {
    channels: DashMap<String, Arc<Channel<M>>>,
    /// Общее количество вызовов `publish`.
    publish_count: AtomicUsize,
    /// Количество сообщений, не попавших в очередь из-за переполнения.
    dropped_count: AtomicUsize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<M> ChannelManager<M> {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            publish_count: AtomicUsize::new(0),
            dropped_count: AtomicUsize::new(0),
        }
    }

    /// Канал с именем `name`; создаётся, если его ещё нет.
    fn channel_or_create(
        &self,
        name: &str,
    ) -> Arc<Channel<M>> {
        if let Some(channel) = self.channels.get(name) {
            return Arc::clone(channel.value());
        }
        let channel = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(channel = name, "Channel created");
                Arc::new(Channel::new(name))
            });
        Arc::clone(channel.value())
    }

    /// Отключает подписчика от перечисленных каналов. Вызывается при
    /// уничтожении подписчика.
    pub(crate) fn detach_id<'a>(
        &self,
        id: SubscriberId,
        names: impl IntoIterator<Item = &'a String>,
    ) {
        for name in names {
            let channel = self.channels.get(name.as_str()).map(|c| Arc::clone(c.value()));
            if let Some(channel) = channel {
                channel.detach(id);
            }
        }
    }

    /// Уже созданный канал.
    pub fn channel(
        &self,
        name: &str,
    ) -> Option<Arc<Channel<M>>> {
        self.channels.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Имена всех созданных каналов, в произвольном порядке.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Число живых подписчиков канала; 0 для несуществующего.
    pub fn subscriber_count(
        &self,
        name: &str,
    ) -> usize {
        self.channel(name).map_or(0, |c| c.subscriber_count())
    }

    pub fn publish_count(&self) -> usize {
        self.publish_count.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped_count.load(Ordering::Relaxed)
    }
}

impl<M: Clone + Send + 'static> ChannelManager<M> {
    /// Менеджер процесса для сообщений типа `M`.
    pub fn global() -> Arc<Self> {
        SingletonRegistry::global().get_or_init(Self::new)
    }

    /// Подключает подписчика к каналу, создавая канал при необходимости.
    ///
    /// Членство самого подписчика не меняется; обычный путь подписки:
    /// [`Subscriber::add_channel`].
    pub fn add(
        &self,
        name: &str,
        subscriber: &Subscriber<M>,
    ) {
        self.channel_or_create(name).attach(subscriber);
    }

    /// Отключает подписчика от канала. Неподключённый подписчик игнорируется.
    pub fn remove(
        &self,
        name: &str,
        subscriber: &Subscriber<M>,
    ) {
        self.channel_or_create(name).detach(subscriber.id());
    }

    /// Рассылает сообщение подписчикам канала.
    ///
    /// # Возвращает
    /// - Количество очередей, в которые попало сообщение.
    pub fn publish(
        &self,
        name: &str,
        message: M,
    ) -> usize {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
        let channel = self.channel_or_create(name);
        let attached = channel.subscriber_count();
        let delivered = channel.on_message(&message);
        if delivered < attached {
            self.dropped_count
                .fetch_add(attached - delivered, Ordering::Relaxed);
        }
        delivered
    }
}

impl<M> Default for ChannelManager<M> {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<ChannelManager<String>> {
        Arc::new(ChannelManager::new())
    }

    fn subscriber(
        manager: &Arc<ChannelManager<String>>,
        capacity: usize,
    ) -> Subscriber<String> {
        Subscriber::builder()
            .manager(manager.clone())
            .queue_capacity(capacity)
            .build()
            .unwrap()
    }

    /// Тест проверяет ленивое создание канала при подписке и публикации.
    #[test]
    fn test_channels_created_lazily() {
        let m = manager();
        assert!(m.channel("a").is_none());

        let s = subscriber(&m, 4);
        m.add("a", &s);
        assert!(m.channel("a").is_some());

        assert_eq!(m.publish("b", "x".to_string()), 0);
        let mut names = m.channel_names();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    /// Тест проверяет, что повторный запрос канала возвращает тот же объект.
    #[test]
    fn test_channel_identity() {
        let m = manager();
        let first = m.channel_or_create("c");
        let second = m.channel_or_create("c");
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Тест проверяет удаление подписчика, в том числе неподключённого.
    #[test]
    fn test_remove() {
        let m = manager();
        let s = subscriber(&m, 4);
        m.remove("never", &s);
        assert!(m.channel("never").is_some());

        m.add("c", &s);
        assert_eq!(m.subscriber_count("c"), 1);
        m.remove("c", &s);
        assert_eq!(m.subscriber_count("c"), 0);
        assert_eq!(m.publish("c", "x".to_string()), 0);
        assert!(s.is_empty());
    }

    /// Тест проверяет счётчики публикаций и потерянных сообщений.
    #[test]
    fn test_publish_counters() {
        let m = manager();
        let s = subscriber(&m, 1);
        m.add("c", &s);

        assert_eq!(m.publish("c", "1".to_string()), 1);
        assert_eq!(m.publish("c", "2".to_string()), 0);
        assert_eq!(m.publish_count(), 2);
        assert_eq!(m.dropped_count(), 1);
    }

    /// Тест проверяет, что глобальный менеджер один на тип сообщений.
    #[test]
    fn test_global_is_shared() {
        #[derive(Clone)]
        struct GlobalProbe;

        let a = ChannelManager::<GlobalProbe>::global();
        let b = ChannelManager::<GlobalProbe>::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
