use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use flume::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::debug;

use super::ChannelManager;
use crate::{PubSubError, PubSubResult};

/// Ёмкость очереди подписчика по умолчанию.
pub const DEFAULT_QUEUE_CAPACITY: usize = 150;

/// Уникальный идентификатор подписчика в пределах процесса.
pub type SubscriberId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Набор имён каналов.
///
/// Собирается из одного имени, среза, массива или `Vec` имён, а также из
/// `HashSet`/`BTreeSet`. Любая другая форма не скомпилируется.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelNames(Vec<String>);

impl ChannelNames {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn require_any(&self) -> PubSubResult<()> {
        if self.0.is_empty() {
            return Err(PubSubError::invalid_argument(
                "at least one channel name is required",
            ));
        }
        Ok(())
    }

    /// Проверяет, что набор не пуст и не содержит пустых имён.
    fn validate(&self) -> PubSubResult<()> {
        self.require_any()?;
        if self.0.iter().any(|name| name.is_empty()) {
            return Err(PubSubError::invalid_argument("channel name must not be empty"));
        }
        Ok(())
    }
}

impl IntoIterator for ChannelNames {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for ChannelNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for ChannelNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<&[&str]> for ChannelNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&[String]> for ChannelNames {
    fn from(names: &[String]) -> Self {
        Self(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for ChannelNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<&str>> for ChannelNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ChannelNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<HashSet<String>> for ChannelNames {
    fn from(names: HashSet<String>) -> Self {
        Self(names.into_iter().collect())
    }
}

impl From<BTreeSet<String>> for ChannelNames {
    fn from(names: BTreeSet<String>) -> Self {
        Self(names.into_iter().collect())
    }
}

pub(crate) struct SubscriberInner<M> {
    id: SubscriberId,
    /// Каналы, на которые подписан подписчик. Под этой же блокировкой
    /// меняется и членство в каналах менеджера.
    channels: Mutex<HashSet<String>>,
    sender: Sender<M>,
    receiver: Receiver<M>,
    capacity: usize,
    manager: Option<Arc<ChannelManager<M>>>,
}

impl<M> Drop for SubscriberInner<M> {
    fn drop(&mut self) {
        let channels = std::mem::take(self.channels.get_mut());
        if let Some(manager) = &self.manager {
            manager.detach_id(self.id, channels.iter());
        }
        debug!(subscriber = self.id, "Subscriber dropped");
    }
}

/// Подписчик: ограниченная очередь сообщений и множество каналов.
///
/// `Subscriber` является дешёвым дескриптором: все клоны разделяют одну очередь и
/// один идентификатор. Когда уничтожается последний клон, подписчик
/// отключается от всех своих каналов.
///
/// # Пример
/// ```
/// use std::sync::Arc;
/// use subpub::{ChannelManager, Publisher, Subscriber};
///
/// let manager = Arc::new(ChannelManager::new());
/// let sub = Subscriber::builder()
///     .manager(manager.clone())
///     .channels(["news", "sport"])
///     .build()
///     .unwrap();
///
/// Publisher::with_manager(manager).publish("news", "hello".to_string());
/// assert_eq!(sub.get_message(false).as_deref(), Some("hello"));
/// ```
pub struct Subscriber<M> {
    inner: Arc<SubscriberInner<M>>,
}

/// Построитель [`Subscriber`].
pub struct SubscriberBuilder<M> {
    channels: Vec<String>,
    capacity: usize,
    manager: ManagerChoice<M>,
}

enum ManagerChoice<M> {
    Global,
    Custom(Arc<ChannelManager<M>>),
    Detached,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<M: Clone + Send + 'static> Subscriber<M> {
    /// Подписчик глобального менеджера без каналов, с очередью по умолчанию.
    pub fn new() -> Self {
        Self::with_parts(DEFAULT_QUEUE_CAPACITY, Some(ChannelManager::global()))
    }

    pub fn builder() -> SubscriberBuilder<M> {
        SubscriberBuilder {
            channels: Vec::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            manager: ManagerChoice::Global,
        }
    }

    fn with_parts(
        capacity: usize,
        manager: Option<Arc<ChannelManager<M>>>,
    ) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        let inner = SubscriberInner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            channels: Mutex::new(HashSet::new()),
            sender,
            receiver,
            capacity,
            manager,
        };
        debug!(subscriber = inner.id, capacity, "Subscriber created");
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Подписывается на каналы. Уже имеющиеся каналы пропускаются.
    ///
    /// # Ошибки
    /// - `InvalidArgument`, если набор пуст или содержит пустое имя.
    pub fn add_channel(
        &self,
        names: impl Into<ChannelNames>,
    ) -> PubSubResult<()> {
        let names = names.into();
        names.validate()?;

        let mut channels = self.inner.channels.lock();
        for name in names {
            if channels.contains(&name) {
                continue;
            }
            if let Some(manager) = &self.inner.manager {
                manager.add(&name, self);
            }
            channels.insert(name);
        }
        Ok(())
    }

    /// Отписывается от каналов. Каналы, на которые подписки нет (в том
    /// числе пустое имя), пропускаются. Подписчик без каналов остаётся
    /// рабочим.
    ///
    /// # Ошибки
    /// - `InvalidArgument`, если набор пуст.
    pub fn remove_channel(
        &self,
        names: impl Into<ChannelNames>,
    ) -> PubSubResult<()> {
        let names = names.into();
        names.require_any()?;

        let mut channels = self.inner.channels.lock();
        for name in names {
            if !channels.contains(&name) {
                continue;
            }
            if let Some(manager) = &self.inner.manager {
                manager.remove(&name, self);
            }
            channels.remove(&name);
        }
        Ok(())
    }
}

impl<M> Subscriber<M> {
    /// Кладёт сообщение в очередь, не блокируясь.
    ///
    /// # Ошибки
    /// - `QueueFull`, если очередь заполнена.
    pub fn notify(
        &self,
        message: M,
    ) -> PubSubResult<()> {
        match self.inner.sender.try_send(message) {
            Ok(()) => Ok(()),
            // Получатель принадлежит самому подписчику, поэтому `Disconnected`
            // здесь не возникает.
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                Err(PubSubError::QueueFull {
                    capacity: self.inner.capacity,
                })
            }
        }
    }

    /// Следующее сообщение очереди.
    ///
    /// При `block = true` ждёт появления сообщения; при `block = false`
    /// сразу возвращает `None`, если очередь пуста.
    pub fn get_message(
        &self,
        block: bool,
    ) -> Option<M> {
        if block {
            self.inner.receiver.recv().ok()
        } else {
            self.inner.receiver.try_recv().ok()
        }
    }

    /// Блокирующий итератор по входящим сообщениям.
    pub fn listen(&self) -> impl Iterator<Item = M> + '_ {
        self.inner.receiver.iter()
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Копия множества каналов подписчика.
    pub fn channels(&self) -> HashSet<String> {
        self.inner.channels.lock().clone()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.channels.lock().len()
    }

    /// Пуста ли очередь сообщений.
    pub fn is_empty(&self) -> bool {
        self.inner.receiver.is_empty()
    }

    /// Количество сообщений в очереди.
    pub fn pending(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub(crate) fn downgrade(&self) -> Weak<SubscriberInner<M>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<SubscriberInner<M>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl<M: Clone + Send + 'static> SubscriberBuilder<M> {
    /// Каналы, на которые подписчик подпишется при создании.
    pub fn channels(
        mut self,
        names: impl Into<ChannelNames>,
    ) -> Self {
        self.channels.extend(names.into());
        self
    }

    pub fn queue_capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.capacity = capacity;
        self
    }

    /// Использовать указанный менеджер вместо глобального.
    pub fn manager(
        mut self,
        manager: Arc<ChannelManager<M>>,
    ) -> Self {
        self.manager = ManagerChoice::Custom(manager);
        self
    }

    /// Подписчик без менеджера: каналы учитываются только локально,
    /// сообщения поступают через [`Subscriber::notify`].
    pub fn detached(mut self) -> Self {
        self.manager = ManagerChoice::Detached;
        self
    }

    /// # Ошибки
    /// - `InvalidArgument`, если ёмкость очереди равна нулю или среди
    ///   каналов есть пустое имя.
    pub fn build(self) -> PubSubResult<Subscriber<M>> {
        if self.capacity == 0 {
            return Err(PubSubError::invalid_argument(
                "queue capacity must be greater than zero",
            ));
        }
        if self.channels.iter().any(|name| name.is_empty()) {
            return Err(PubSubError::invalid_argument("channel name must not be empty"));
        }

        let manager = match self.manager {
            ManagerChoice::Global => Some(ChannelManager::global()),
            ManagerChoice::Custom(manager) => Some(manager),
            ManagerChoice::Detached => None,
        };
        let subscriber = Subscriber::with_parts(self.capacity, manager);
        if !self.channels.is_empty() {
            subscriber.add_channel(self.channels)?;
        }
        Ok(subscriber)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Subscriber
////////////////////////////////////////////////////////////////////////////////

impl<M: Clone + Send + 'static> Default for Subscriber<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> PartialEq for Subscriber<M> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id() == other.id()
    }
}

impl<M> Eq for Subscriber<M> {}

impl<M> Hash for Subscriber<M> {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id().hash(state);
    }
}

impl<M> fmt::Debug for Subscriber<M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("channels", &self.channel_count())
            .field("pending", &self.pending())
            .field("capacity", &self.capacity())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use rstest::rstest;

    use super::*;

    fn isolated() -> (Arc<ChannelManager<u32>>, Subscriber<u32>) {
        let manager = Arc::new(ChannelManager::new());
        let sub = Subscriber::builder()
            .manager(manager.clone())
            .build()
            .unwrap();
        (manager, sub)
    }

    /// Тест проверяет, что членство подписчика совпадает с членством в
    /// каналах менеджера.
    #[test]
    fn test_membership_mirrors_manager() {
        let (manager, sub) = isolated();
        sub.add_channel(["a", "b"]).unwrap();
        sub.add_channel("a").unwrap();

        assert_eq!(sub.channel_count(), 2);
        assert_eq!(manager.subscriber_count("a"), 1);
        assert_eq!(manager.subscriber_count("b"), 1);

        sub.remove_channel(vec!["a", "missing"]).unwrap();
        assert_eq!(sub.channels(), HashSet::from(["b".to_string()]));
        assert_eq!(manager.subscriber_count("a"), 0);
        assert!(manager.channel("missing").is_none());
    }

    /// Тест проверяет отказ подписки на пустой набор каналов и пустое имя.
    #[rstest]
    #[case(ChannelNames::from(Vec::<String>::new()))]
    #[case(ChannelNames::from(""))]
    #[case(ChannelNames::from(["ok", ""]))]
    fn test_invalid_channel_names(#[case] names: ChannelNames) {
        let (_, sub) = isolated();
        assert!(matches!(
            sub.add_channel(names),
            Err(PubSubError::InvalidArgument { .. })
        ));
        assert_eq!(sub.channel_count(), 0);
    }

    /// Тест проверяет, что отписка отказывает только на пустой набор, а
    /// пустое имя просто пропускается.
    #[test]
    fn test_remove_channel_skips_empty_name() {
        let (manager, sub) = isolated();
        sub.add_channel("ok").unwrap();

        assert!(matches!(
            sub.remove_channel(Vec::<String>::new()),
            Err(PubSubError::InvalidArgument { .. })
        ));
        sub.remove_channel("").unwrap();
        assert_eq!(sub.channel_count(), 1);
        assert!(manager.channel("").is_none());

        sub.remove_channel(["ok", ""]).unwrap();
        assert_eq!(sub.channel_count(), 0);
        assert_eq!(manager.subscriber_count("ok"), 0);
    }

    /// Тест проверяет формы набора каналов.
    #[test]
    fn test_channel_names_shapes() {
        let set: HashSet<String> = ["a".to_string()].into();
        let tree: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        assert_eq!(ChannelNames::from("a").len(), 1);
        assert_eq!(ChannelNames::from(String::from("a")).len(), 1);
        assert_eq!(ChannelNames::from(&["a", "b"][..]).len(), 2);
        assert_eq!(ChannelNames::from(vec!["a".to_string()]).len(), 1);
        assert_eq!(ChannelNames::from(set).len(), 1);
        assert_eq!(ChannelNames::from(tree).len(), 2);
    }

    /// Тест проверяет FIFO-порядок и неблокирующее чтение пустой очереди.
    #[test]
    fn test_queue_fifo() {
        let (_, sub) = isolated();
        assert!(sub.is_empty());
        assert_eq!(sub.get_message(false), None);

        sub.notify(1).unwrap();
        sub.notify(2).unwrap();
        assert_eq!(sub.pending(), 2);
        assert_eq!(sub.get_message(false), Some(1));
        assert_eq!(sub.get_message(true), Some(2));
        assert!(sub.is_empty());
    }

    /// Тест проверяет отказ при переполненной очереди.
    #[test]
    fn test_notify_queue_full() {
        let sub = Subscriber::<u32>::builder()
            .queue_capacity(2)
            .detached()
            .build()
            .unwrap();
        sub.notify(1).unwrap();
        sub.notify(2).unwrap();
        assert_eq!(sub.notify(3), Err(PubSubError::QueueFull { capacity: 2 }));
        assert_eq!(sub.pending(), 2);
    }

    /// Тест проверяет, что блокирующее чтение дожидается сообщения.
    #[test]
    fn test_blocking_get_waits() {
        let (_, sub) = isolated();
        let producer = sub.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.notify(7).unwrap();
        });
        assert_eq!(sub.get_message(true), Some(7));
        handle.join().unwrap();
    }

    /// Тест проверяет итератор `listen`.
    #[test]
    fn test_listen() {
        let (_, sub) = isolated();
        for n in 0..3 {
            sub.notify(n).unwrap();
        }
        let got: Vec<u32> = sub.listen().take(3).collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    /// Тест проверяет валидацию построителя.
    #[test]
    fn test_builder_validation() {
        let zero = Subscriber::<u32>::builder()
            .queue_capacity(0)
            .detached()
            .build();
        assert!(matches!(zero, Err(PubSubError::InvalidArgument { .. })));

        let empty_name = Subscriber::<u32>::builder()
            .channels("")
            .detached()
            .build();
        assert!(matches!(empty_name, Err(PubSubError::InvalidArgument { .. })));
    }

    /// Тест проверяет, что каналы из построителя регистрируются в менеджере.
    #[test]
    fn test_builder_channels_registered() {
        let manager = Arc::new(ChannelManager::<u32>::new());
        let sub = Subscriber::builder()
            .manager(manager.clone())
            .channels("a")
            .channels(vec!["b", "c"])
            .queue_capacity(3)
            .build()
            .unwrap();

        assert_eq!(sub.capacity(), 3);
        assert_eq!(sub.channel_count(), 3);
        for name in ["a", "b", "c"] {
            assert!(manager.channel(name).unwrap().contains(&sub));
        }
    }

    /// Тест проверяет, что уничтоженный подписчик отключается от каналов.
    #[test]
    fn test_drop_detaches() {
        let (manager, sub) = isolated();
        sub.add_channel(["a", "b"]).unwrap();
        let clone = sub.clone();
        drop(sub);
        assert_eq!(manager.subscriber_count("a"), 1);

        drop(clone);
        assert_eq!(manager.subscriber_count("a"), 0);
        assert_eq!(manager.subscriber_count("b"), 0);
        assert_eq!(manager.publish("a", 1), 0);
    }

    /// Тест проверяет идентичность подписчиков.
    #[test]
    fn test_identity() {
        let (_, a) = isolated();
        let (_, b) = isolated();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    /// Тест проверяет подписчика по умолчанию.
    #[test]
    fn test_default_subscriber() {
        #[derive(Clone)]
        struct DefaultProbe;

        let sub = Subscriber::<DefaultProbe>::new();
        assert_eq!(sub.capacity(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(sub.channel_count(), 0);
        sub.add_channel("defaults").unwrap();
        assert_eq!(
            ChannelManager::<DefaultProbe>::global().subscriber_count("defaults"),
            1
        );
    }
}
