use std::collections::HashMap;

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    channels::{SubscriberBuilder, DEFAULT_QUEUE_CAPACITY},
    error::SettingsError,
    logging::{LogFormat, LoggingConfig},
    pubsub::BusConfig,
};

/// Префикс переменных окружения (`SUBPUB_VERBOSE`, `SUBPUB_QUEUE_CAPACITY`, ...).
pub const ENV_PREFIX: &str = "SUBPUB";

/// Настройки библиотеки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub verbose: bool,
    pub send_event: bool,
    pub queue_capacity: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: true,
            send_event: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl Settings {
    /// Значения по умолчанию, перекрытые переменными окружения.
    pub fn load() -> Result<Self, SettingsError> {
        Self::build(Self::with_defaults()?.add_source(Self::environment(None)))
    }

    /// Как [`load`](Self::load), но сначала читает необязательный файл
    /// (`subpub.toml`, `subpub.json`, ...). Окружение важнее файла.
    pub fn load_with_file(path: &str) -> Result<Self, SettingsError> {
        Self::build(
            Self::with_defaults()?
                .add_source(File::with_name(path).required(false))
                .add_source(Self::environment(None)),
        )
    }

    /// Загрузка из готового набора переменных вместо окружения процесса.
    pub fn load_from_vars(vars: HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::build(Self::with_defaults()?.add_source(Self::environment(Some(vars))))
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, SettingsError> {
        let defaults = Settings::default();
        Ok(Config::builder()
            .set_default("verbose", defaults.verbose)?
            .set_default("send_event", defaults.send_event)?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", defaults.log_format.to_string())?)
    }

    fn environment(vars: Option<HashMap<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(vars)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Ошибки
    /// - `Invalid`, если ёмкость очереди равна нулю.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.queue_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "queue_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            verbose: self.verbose,
            send_event: self.send_event,
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            ..LoggingConfig::default()
        }
    }

    /// Построитель подписчика с ёмкостью очереди из настроек.
    pub fn subscriber_builder<M: Clone + Send + 'static>(&self) -> SubscriberBuilder<M> {
        crate::Subscriber::builder().queue_capacity(self.queue_capacity)
    }
}
