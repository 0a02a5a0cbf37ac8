pub mod pubsub;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use pubsub::*;
