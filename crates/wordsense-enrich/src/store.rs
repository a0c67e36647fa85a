//! Persistence seam. Only validated words are ever handed to a store.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use wordsense_schema::{Word, WordId};

#[async_trait]
pub trait WordStore: Send + Sync {
    /// Insert or replace by `word_id`.
    async fn save(&self, word: &Word) -> Result<(), StoreError>;

    async fn get(&self, word_id: WordId) -> Result<Option<Word>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWordStore {
    words: RwLock<HashMap<WordId, Word>>,
}

impl InMemoryWordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.read().is_empty()
    }
}

#[async_trait]
impl WordStore for InMemoryWordStore {
    async fn save(&self, word: &Word) -> Result<(), StoreError> {
        self.words.write().insert(word.word_id, word.clone());
        tracing::debug!(word_id = %word.word_id, headword = %word.headword, "saved word");
        Ok(())
    }

    async fn get(&self, word_id: WordId) -> Result<Option<Word>, StoreError> {
        Ok(self.words.read().get(&word_id).cloned())
    }
}
