use std::{
    collections::{HashMap, HashSet},
    marker::PhantomData,
};

use regex::Regex;
use tracing::warn;

use super::Handler;

/// Коллекция обработчиков одной темы.
///
/// - `Vec<Handler<P>>`: упорядоченный список, дубликаты разрешены;
/// - `HashSet<Handler<P>>`: множество, повторная подписка того же
///   обработчика схлопывается, порядок обхода не определён.
pub trait HandlerSet<P>: Default {
    fn insert(
        &mut self,
        handler: Handler<P>,
    );

    /// Удаляет одну регистрацию обработчика. Возвращает `false`, если его нет.
    fn remove(
        &mut self,
        handler: &Handler<P>,
    ) -> bool;

    /// Копия обработчиков для вызова вне блокировок.
    fn snapshot(&self) -> Vec<Handler<P>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> HandlerSet<P> for Vec<Handler<P>> {
    fn insert(
        &mut self,
        handler: Handler<P>,
    ) {
        self.push(handler);
    }

    fn remove(
        &mut self,
        handler: &Handler<P>,
    ) -> bool {
        match self.iter().position(|h| h == handler) {
            Some(idx) => {
                Vec::remove(self, idx);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Handler<P>> {
        self.clone()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<P> HandlerSet<P> for HashSet<Handler<P>> {
    fn insert(
        &mut self,
        handler: Handler<P>,
    ) {
        HashSet::insert(self, handler);
    }

    fn remove(
        &mut self,
        handler: &Handler<P>,
    ) -> bool {
        HashSet::remove(self, handler)
    }

    fn snapshot(&self) -> Vec<Handler<P>> {
        self.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        HashSet::len(self)
    }
}

/// Хранилище «тема → обработчики».
///
/// Подписка и отписка всегда адресуют тему точно; различаются варианты
/// только поиском при публикации ([`TopicIndex::lookup`]).
/// Запись темы, созданная однажды, не удаляется: после последней отписки
/// остаётся пустая коллекция.
pub trait TopicIndex<P>: Default {
    type Set: HandlerSet<P>;

    /// Коллекция темы; создаётся при первом обращении.
    fn entry(
        &mut self,
        topic: &str,
    ) -> &mut Self::Set;

    fn get(
        &self,
        topic: &str,
    ) -> Option<&Self::Set>;

    fn get_mut(
        &mut self,
        topic: &str,
    ) -> Option<&mut Self::Set>;

    /// Обработчики, которым надо доставить событие `topic`.
    fn lookup(
        &self,
        topic: &str,
    ) -> Vec<Handler<P>>;

    /// Зарегистрированные ключи тем.
    fn topics(&self) -> Vec<String>;
}

/// Индекс с точным (побайтовым) совпадением темы.
#[derive(Debug)]
pub struct ExactIndex<P, S = Vec<Handler<P>>> {
    entries: HashMap<String, S>,
    _payload: PhantomData<fn(&P)>,
}

impl<P, S> Default for ExactIndex<P, S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            _payload: PhantomData,
        }
    }
}

impl<P, S: HandlerSet<P>> TopicIndex<P> for ExactIndex<P, S> {
    type Set = S;

    fn entry(
        &mut self,
        topic: &str,
    ) -> &mut S {
        self.entries.entry(topic.to_string()).or_default()
    }

    fn get(
        &self,
        topic: &str,
    ) -> Option<&S> {
        self.entries.get(topic)
    }

    fn get_mut(
        &mut self,
        topic: &str,
    ) -> Option<&mut S> {
        self.entries.get_mut(topic)
    }

    fn lookup(
        &self,
        topic: &str,
    ) -> Vec<Handler<P>> {
        self.entries
            .get(topic)
            .map(|set| set.snapshot())
            .unwrap_or_default()
    }

    /// Порядок ключей не гарантирован.
    fn topics(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Индекс с поиском по регулярному выражению.
///
/// Ключи подписок хранятся как есть, в порядке вставки. При публикации
/// регулярным выражением становится имя события: оно сопоставляется с
/// позиции 0 (без якоря в конце) с каждым сохранённым ключом, и результатом
/// будет коллекция *первого* совпавшего ключа, даже если она пуста.
///
/// Поэтому `subscribe("te.*")` + `publish("test1")` ничего не доставит, а
/// `subscribe("test1")` + `publish("te.*")` доставит.
#[derive(Debug)]
pub struct RegexIndex<P, S = Vec<Handler<P>>> {
    entries: Vec<(String, S)>,
    positions: HashMap<String, usize>,
    _payload: PhantomData<fn(&P)>,
}

impl<P, S> Default for RegexIndex<P, S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            _payload: PhantomData,
        }
    }
}

impl<P, S> RegexIndex<P, S> {
    /// Компилирует имя события в регулярное выражение как есть.
    fn compile(topic: &str) -> Option<Regex> {
        match Regex::new(topic) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(topic, error = %err, "Topic is not a valid pattern, no handlers matched");
                None
            }
        }
    }
}

impl<P, S: HandlerSet<P>> TopicIndex<P> for RegexIndex<P, S> {
    type Set = S;

    fn entry(
        &mut self,
        topic: &str,
    ) -> &mut S {
        let existing = self.positions.get(topic).copied();
        let idx = match existing {
            Some(idx) => idx,
            None => {
                self.entries.push((topic.to_string(), S::default()));
                let idx = self.entries.len() - 1;
                self.positions.insert(topic.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx].1
    }

    fn get(
        &self,
        topic: &str,
    ) -> Option<&S> {
        self.positions.get(topic).map(|&idx| &self.entries[idx].1)
    }

    fn get_mut(
        &mut self,
        topic: &str,
    ) -> Option<&mut S> {
        match self.positions.get(topic) {
            Some(&idx) => Some(&mut self.entries[idx].1),
            None => None,
        }
    }

    fn lookup(
        &self,
        topic: &str,
    ) -> Vec<Handler<P>> {
        let Some(re) = Self::compile(topic) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .find(|(key, _)| re.find(key).is_some_and(|m| m.start() == 0))
            .map(|(_, set)| set.snapshot())
            .unwrap_or_default()
    }

    fn topics(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
