use std::collections::BTreeMap;
use std::sync::Arc;

use qcm_core::model::{ChapterKey, SavedResponse, UserId};
use serde_json::Value;

use crate::repository::{
    KeyValueStore, StorageError, WriteLock, decode_entry, encode_entry, keys, load_json,
    save_json, try_load_json,
};

/// Saved responses of one user in one chapter, by question index.
pub type ChapterResponses = BTreeMap<u32, SavedResponse>;

/// Stored layout: user id, then chapter key, then question index. Entries
/// stay undecoded so that one unreadable response never hides the others.
type RawResponses = BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>;

/// Saved answers, partitioned by user, then chapter key, then question index.
///
/// All partitions live in one stored blob. Reads never fail: an unreadable
/// blob reads as empty and an unreadable entry is skipped. `put` overwrites;
/// refusing a second answer to the same question is the caller's job.
#[derive(Clone)]
pub struct AnswerStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: WriteLock,
}

impl AnswerStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: WriteLock::default(),
        }
    }

    pub async fn get(
        &self,
        user_id: &UserId,
        chapter_key: &ChapterKey,
        question_index: u32,
    ) -> Option<SavedResponse> {
        self.chapter_responses(user_id, chapter_key)
            .await
            .remove(&question_index)
    }

    /// Store a response, leaving every other stored entry as it was.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the current answers cannot be read or the
    /// write fails. Nothing is written in either case.
    pub async fn put(
        &self,
        user_id: &UserId,
        chapter_key: &ChapterKey,
        question_index: u32,
        response: SavedResponse,
    ) -> Result<(), StorageError> {
        let entry = encode_entry(&response)?;
        let _guard = self.write_lock.lock().await;
        let mut all: RawResponses = try_load_json(self.kv.as_ref(), keys::RESPONSES).await?;
        all.entry(user_id.as_str().to_owned())
            .or_default()
            .entry(chapter_key.as_str().to_owned())
            .or_default()
            .insert(question_index.to_string(), entry);
        save_json(self.kv.as_ref(), keys::RESPONSES, &all).await
    }

    pub async fn chapter_responses(
        &self,
        user_id: &UserId,
        chapter_key: &ChapterKey,
    ) -> ChapterResponses {
        let mut all: RawResponses = load_json(self.kv.as_ref(), keys::RESPONSES).await;
        let Some(chapters) = all.remove(user_id.as_str()) else {
            return ChapterResponses::new();
        };
        chapters
            .into_iter()
            .filter(|(key, _)| ChapterKey::new(key) == *chapter_key)
            .flat_map(|(_, entries)| entries)
            .filter_map(|(index, entry)| {
                let Ok(index) = index.parse::<u32>() else {
                    tracing::warn!(%index, "skipping response with a non-numeric index");
                    return None;
                };
                decode_entry(keys::RESPONSES, &entry).map(|r| (index, r))
            })
            .collect()
    }
}
