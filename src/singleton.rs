//! Реестр одиночек: не более одного экземпляра каждого типа на реестр.
//!
//! Глобальный реестр процесса хранит общие шины и менеджеры каналов.
//! Для тестов можно создать изолированный реестр через
//! [`SingletonRegistry::new`].

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error};

type Entry = Arc<dyn Any + Send + Sync>;

static GLOBAL: Lazy<SingletonRegistry> = Lazy::new(SingletonRegistry::new);

/// Потокобезопасное хранилище «тип → экземпляр».
#[derive(Default)]
pub struct SingletonRegistry {
    entries: Mutex<HashMap<TypeId, Entry>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Реестр процесса. Создаётся при первом обращении и живёт до
    /// завершения процесса.
    pub fn global() -> &'static SingletonRegistry {
        &GLOBAL
    }

    /// Возвращает экземпляр `T`, создавая его при первом обращении.
    ///
    /// `init` выполняется под блокировкой реестра, поэтому конкурирующие
    /// вызовы не создадут второй экземпляр. `init` не должен обращаться к
    /// этому же реестру.
    pub fn get_or_init<T, F>(
        &self,
        init: F,
    ) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();
        let id = TypeId::of::<T>();

        if let Some(existing) = entries.get(&id) {
            match Arc::clone(existing).downcast::<T>() {
                Ok(instance) => return instance,
                Err(_) => {
                    error!(
                        type_name = type_name::<T>(),
                        "Singleton entry has unexpected type, replacing"
                    );
                }
            }
        }

        let instance = Arc::new(init());
        entries.insert(id, instance.clone() as Entry);
        debug!(type_name = type_name::<T>(), "Singleton created");
        instance
    }

    /// Уже созданный экземпляр `T`, если он есть.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry).downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.lock().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
