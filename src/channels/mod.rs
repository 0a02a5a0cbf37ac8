//! Модель каналов и подписчиков с очередями.
//!
//! - `manager`: реестр каналов, по умолчанию один на процесс.
//! - `channel`: канал и рассылка сообщения подписчикам.
//! - `subscriber`: подписчик с ограниченной очередью и его построитель.
//! - `publisher`: издатель поверх менеджера.
//!
//! Порядок блокировок: членство подписчика → сегмент `DashMap` менеджера →
//! мьютекс канала. Уведомление подписчиков выполняется без блокировок.

pub mod channel;
pub mod manager;
pub mod publisher;
pub mod subscriber;

pub use channel::*;
pub use manager::*;
pub use publisher::*;
pub use subscriber::*;
