//! Шина событий с обработчиками-замыканиями.
//!
//! - `handler`: обёртка над обработчиком с объявленной формой вызова.
//! - `index`: хранилища «тема → обработчики» (точное совпадение и regex).
//! - `bus`: однопоточная шина [`EventBus`] и её варианты.
//! - `threadsafe`: потокобезопасные шины-одиночки.
//! - `dispatch`: шина с фоновой доставкой и приёмник сбоев.

pub mod bus;
pub mod dispatch;
pub mod handler;
pub mod index;
pub mod threadsafe;

pub use bus::*;
pub use dispatch::*;
pub use handler::*;
pub use index::*;
pub use threadsafe::*;
