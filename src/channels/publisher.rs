use std::sync::Arc;

use super::ChannelManager;

/// Издатель: отправляет сообщения в каналы менеджера.
pub struct Publisher<M> {
    manager: Arc<ChannelManager<M>>,
}

impl<M: Clone + Send + 'static> Publisher<M> {
    /// Издатель глобального менеджера.
    pub fn new() -> Self {
        Self::with_manager(ChannelManager::global())
    }

    pub fn with_manager(manager: Arc<ChannelManager<M>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ChannelManager<M>> {
        &self.manager
    }

    /// Публикует сообщение в канал.
    ///
    /// # Возвращает
    /// - Количество подписчиков, получивших сообщение.
    pub fn publish(
        &self,
        channel: &str,
        message: M,
    ) -> usize {
        self.manager.publish(channel, message)
    }
}

impl<M: Clone + Send + 'static> Default for Publisher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Publisher<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}
