//! Shared test doubles for dictionary unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::{DictionaryError, Result};
use super::provider::DictionaryProvider;
use super::types::{DictSource, Definition, DictionaryResponse, Translation};

/// In-memory provider with switchable availability and failure injection.
pub struct MockProvider {
    name: String,
    display_name: String,
    source: DictSource,
    languages: Vec<String>,
    entries: Mutex<HashMap<String, DictionaryResponse>>,
    available: AtomicBool,
    failing: AtomicBool,
    closed: AtomicBool,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, source: DictSource) -> Self {
        Self {
            name: name.to_string(),
            display_name: format!("Mock {name}"),
            source,
            languages: vec!["en".to_string()],
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_entry(self, response: DictionaryResponse) -> Self {
        self.insert(response);
        self
    }

    pub fn insert(&self, response: DictionaryResponse) {
        self.entries
            .lock()
            .unwrap()
            .insert(response.word.to_lowercase(), response);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DictionaryProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn source(&self) -> DictSource {
        self.source
    }

    fn supported_languages(&self) -> &[String] {
        &self.languages
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn query(&self, word: &str, _language: &str) -> Result<Option<DictionaryResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DictionaryError::query(&self.name, "injected failure"));
        }
        let found = self.entries.lock().unwrap().get(&word.to_lowercase()).cloned();
        Ok(found.map(|mut r| {
            r.source = self.source;
            r
        }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn definition(pos: &str, text: &str) -> Definition {
    Definition {
        part_of_speech: pos.to_string(),
        definition: text.to_string(),
        ..Default::default()
    }
}

pub fn translation(pos: &str, meanings: &[&str]) -> Translation {
    Translation {
        pos_tag: pos.to_string(),
        meanings: meanings.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn entry_with_definitions(word: &str, defs: &[(&str, &str)]) -> DictionaryResponse {
    DictionaryResponse {
        word: word.to_string(),
        definitions: defs.iter().map(|(p, d)| definition(p, d)).collect(),
        ..Default::default()
    }
}
