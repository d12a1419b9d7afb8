use std::collections::BTreeMap;
use std::sync::Arc;

use qcm_core::model::{Catalog, Chapter, ChapterKey, QuestionBank, QuestionDefinition, default_chapters};
use serde_json::Value;

use crate::repository::{
    KeyValueStore, StorageError, WriteLock, decode_entry, encode_entry, keys, load_json,
    save_json, try_load_json,
};

/// Question sets by raw chapter key, each left undecoded until read.
type RawQuestionBank = BTreeMap<String, Value>;

/// Chapter list and question bank.
#[derive(Clone)]
pub struct ChapterStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: WriteLock,
}

impl ChapterStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: WriteLock::default(),
        }
    }

    /// Stored chapters. The defaults are seeded and persisted only when no
    /// chapter list has ever been stored.
    ///
    /// When the stored list cannot be read the defaults are served without
    /// being written, so the stored list is left for a later read.
    pub async fn list(&self) -> Vec<Chapter> {
        match self.kv.get_raw(keys::CHAPTERS).await {
            Ok(None) => self.seed_defaults().await,
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(entries) if entries.is_empty() => self.seed_defaults().await,
                Ok(entries) => decode_chapters(&entries),
                Err(err) => {
                    tracing::warn!(%err, "chapter list is corrupt, serving defaults");
                    default_chapters()
                }
            },
            Err(err) => {
                tracing::warn!(%err, "chapter list unreadable, serving defaults");
                default_chapters()
            }
        }
    }

    async fn seed_defaults(&self) -> Vec<Chapter> {
        let _guard = self.write_lock.lock().await;
        // another caller may have seeded while this one waited
        match try_load_json::<Vec<Value>>(self.kv.as_ref(), keys::CHAPTERS).await {
            Ok(entries) if !entries.is_empty() => decode_chapters(&entries),
            Ok(_) => {
                let defaults = default_chapters();
                match save_json(self.kv.as_ref(), keys::CHAPTERS, &defaults).await {
                    Ok(()) => tracing::info!(count = defaults.len(), "seeded default chapters"),
                    Err(err) => tracing::warn!(%err, "could not persist default chapters"),
                }
                defaults
            }
            Err(err) => {
                tracing::warn!(%err, "chapter list unreadable, serving defaults");
                default_chapters()
            }
        }
    }

    /// Append a chapter. An empty list is seeded with the defaults first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a chapter with the same key exists,
    /// or the read or write error.
    pub async fn add(&self, chapter: Chapter) -> Result<(), StorageError> {
        let entry = encode_entry(&chapter)?;
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<Value> = try_load_json(self.kv.as_ref(), keys::CHAPTERS).await?;
        if entries.is_empty() {
            entries = default_chapters()
                .iter()
                .map(encode_entry)
                .collect::<Result<_, _>>()?;
        }
        let key = chapter.key();
        let taken = entries
            .iter()
            .filter_map(|e| decode_entry::<Chapter>(keys::CHAPTERS, e))
            .any(|c| c.key() == key);
        if taken {
            return Err(StorageError::Conflict);
        }
        entries.push(entry);
        save_json(self.kv.as_ref(), keys::CHAPTERS, &entries).await
    }

    /// Readable question sets. A set that does not decode is skipped as a
    /// whole, since answers are keyed by question position.
    pub async fn question_bank(&self) -> QuestionBank {
        let raw: RawQuestionBank = load_json(self.kv.as_ref(), keys::QUESTION_BANK).await;
        raw.iter()
            .filter_map(|(key, set)| {
                decode_entry::<Vec<QuestionDefinition>>(keys::QUESTION_BANK, set)
                    .map(|questions| (ChapterKey::new(key), questions))
            })
            .collect()
    }

    /// Replace the question set stored for `key`, leaving the other sets as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read or the write fails.
    pub async fn save_question_set(
        &self,
        key: ChapterKey,
        questions: Vec<QuestionDefinition>,
    ) -> Result<(), StorageError> {
        let entry = encode_entry(&questions)?;
        let _guard = self.write_lock.lock().await;
        let mut bank: RawQuestionBank = try_load_json(self.kv.as_ref(), keys::QUESTION_BANK).await?;
        bank.retain(|stored, _| ChapterKey::new(stored) != key);
        bank.insert(key.as_str().to_owned(), entry);
        save_json(self.kv.as_ref(), keys::QUESTION_BANK, &bank).await
    }

    /// Chapters resolved against the current question bank.
    pub async fn catalog(&self) -> Catalog {
        let chapters = self.list().await;
        let bank = self.question_bank().await;
        Catalog::build(chapters, &bank)
    }
}

fn decode_chapters(entries: &[Value]) -> Vec<Chapter> {
    let chapters: Vec<Chapter> = entries
        .iter()
        .filter_map(|e| decode_entry(keys::CHAPTERS, e))
        .collect();
    if chapters.is_empty() {
        tracing::warn!("no readable chapter stored, serving defaults");
        return default_chapters();
    }
    chapters
}
