use std::{
    collections::HashMap,
    fmt,
    sync::Weak,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::subscriber::{Subscriber, SubscriberId, SubscriberInner};

/// Именованный канал: множество подключённых подписчиков.
///
/// Канал держит подписчиков по слабым ссылкам. Подписчик, у которого не
/// осталось ни одного дескриптора, выбрасывается при следующей доставке
/// (или раньше, когда он сам отключается при уничтожении).
pub struct Channel<M> {
    name: String,
    subscribers: Mutex<HashMap<SubscriberId, Weak<SubscriberInner<M>>>>,
}

impl<M> Channel<M> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Подключает подписчика. Возвращает `false`, если он уже подключён.
    pub(crate) fn attach(
        &self,
        subscriber: &Subscriber<M>,
    ) -> bool {
        let mut subscribers = self.subscribers.lock();
        let added = subscribers
            .insert(subscriber.id(), subscriber.downgrade())
            .is_none();
        if added {
            debug!(channel = %self.name, subscriber = subscriber.id(), "Subscriber attached");
        }
        added
    }

    /// Отключает подписчика по идентификатору. Отсутствующий игнорируется.
    pub(crate) fn detach(
        &self,
        id: SubscriberId,
    ) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(channel = %self.name, subscriber = id, "Subscriber detached");
        }
        removed
    }

    pub fn contains(
        &self,
        subscriber: &Subscriber<M>,
    ) -> bool {
        self.subscribers.lock().contains_key(&subscriber.id())
    }

    /// Число живых подписчиков канала.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<M: Clone + Send + 'static> Channel<M> {
    /// Рассылает сообщение всем подключённым подписчикам.
    ///
    /// Подписчики копируются под блокировкой, уведомляются после её
    /// освобождения. Переполненная очередь пропускается с предупреждением.
    ///
    /// # Возвращает
    /// - Количество очередей, в которые попало сообщение.
    pub fn on_message(
        &self,
        message: &M,
    ) -> usize {
        let targets: Vec<Subscriber<M>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers
                .values()
                .filter_map(Subscriber::upgrade)
                .collect()
        };

        if targets.is_empty() {
            debug!(channel = %self.name, "No subscribers for channel");
            return 0;
        }

        let mut delivered = 0;
        for subscriber in &targets {
            match subscriber.notify(message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    channel = %self.name,
                    subscriber = subscriber.id(),
                    error = %err,
                    "Message dropped"
                ),
            }
        }
        delivered
    }
}

impl<M> fmt::Display for Channel<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Channel {}", self.name)
    }
}

impl<M> fmt::Debug for Channel<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(capacity: usize) -> Subscriber<String> {
        Subscriber::builder()
            .queue_capacity(capacity)
            .detached()
            .build()
            .unwrap()
    }

    /// Тест проверяет, что подписчик подключается к каналу один раз.
    #[test]
    fn test_attach_is_idempotent() {
        let channel = Channel::new("news");
        let s = detached(4);
        assert!(channel.attach(&s));
        assert!(!channel.attach(&s.clone()));
        assert_eq!(channel.subscriber_count(), 1);
        assert!(channel.contains(&s));
        assert_eq!(channel.to_string(), "Channel news");
    }

    /// Тест проверяет рассылку всем подписчикам канала.
    #[test]
    fn test_on_message_fans_out() {
        let channel = Channel::new("news");
        let a = detached(4);
        let b = detached(4);
        channel.attach(&a);
        channel.attach(&b);

        assert_eq!(channel.on_message(&"hi".to_string()), 2);
        assert_eq!(a.get_message(false).as_deref(), Some("hi"));
        assert_eq!(b.get_message(false).as_deref(), Some("hi"));
    }

    /// Тест проверяет, что переполненная очередь пропускается, а остальные
    /// подписчики получают сообщение.
    #[test]
    fn test_full_queue_is_skipped() {
        let channel = Channel::new("c");
        let small = detached(1);
        let large = detached(8);
        channel.attach(&small);
        channel.attach(&large);

        assert_eq!(channel.on_message(&"1".to_string()), 2);
        assert_eq!(channel.on_message(&"2".to_string()), 1);
        assert_eq!(small.pending(), 1);
        assert_eq!(large.pending(), 2);
    }

    /// Тест проверяет отключение и удаление уничтоженных подписчиков.
    #[test]
    fn test_detach_and_prune() {
        let channel = Channel::new("c");
        let keep = detached(2);
        let gone = detached(2);
        channel.attach(&keep);
        channel.attach(&gone);

        assert!(channel.detach(keep.id()));
        assert!(!channel.detach(keep.id()));

        drop(gone);
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.on_message(&"x".to_string()), 0);
    }
}
