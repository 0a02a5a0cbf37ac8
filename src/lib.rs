//! Внутрипроцессный publish/subscribe.
//!
//! Две модели рядом:
//! - шина событий с обработчиками-замыканиями ([`SimpleBus`], [`RegexBus`],
//!   потокобезопасные [`ThreadSafeBus`] / [`ThreadSafeRegexBus`] и
//!   [`ConcurrentBus`] с фоновой доставкой);
//! - каналы и подписчики с ограниченными очередями ([`ChannelManager`],
//!   [`Subscriber`], [`Publisher`]).

/// Channels, subscribers with bounded queues, publisher.
pub mod channels;
/// Settings loading (defaults, optional file, `SUBPUB_*` environment).
pub mod config;
/// Error types: pub/sub errors, settings and logging errors.
pub mod error;
/// Logging setup on top of `tracing-subscriber`.
pub mod logging;
/// Callback event buses.
pub mod pubsub;
/// Type-keyed registry of process-wide instances.
pub mod singleton;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Channel model.
pub use channels::{
    Channel, ChannelManager, ChannelNames, Publisher, Subscriber, SubscriberBuilder, SubscriberId,
    DEFAULT_QUEUE_CAPACITY,
};
/// Settings.
pub use self::config::Settings;
/// Operation errors and result types.
pub use error::{
    ErrorExt, LoggingError, PubSubError, PubSubResult, SettingsError, StatusCode,
};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Event buses.
pub use pubsub::{
    reset_failure_hook, set_failure_hook, BusConfig, ConcurrentBus, ConcurrentEventBus,
    ConcurrentRegexBus, DispatchFailure, EventBus, ExactIndex, Handler, HandlerFailure,
    HandlerKind, HandlerResult, RegexBus, RegexIndex, SimpleBus, ThreadSafeBus,
    ThreadSafeEventBus, ThreadSafeRegexBus, TopicIndex,
};
/// Singleton registry.
pub use singleton::SingletonRegistry;
