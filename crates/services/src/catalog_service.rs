use qcm_core::model::{Chapter, ChapterId, ChapterKey, QuestionDefinition, ResolvedChapter};
use storage::ChapterStore;
use storage::repository::StorageError;

use crate::error::CatalogError;

/// One row of the chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterListing {
    pub id: ChapterId,
    pub title: String,
    pub key: ChapterKey,
    pub question_count: usize,
}

/// Resolves chapters to their question sets and maintains the catalog.
#[derive(Clone)]
pub struct CatalogService {
    chapters: ChapterStore,
}

impl CatalogService {
    #[must_use]
    pub fn new(chapters: ChapterStore) -> Self {
        Self { chapters }
    }

    /// Chapters in catalog order with their question counts.
    pub async fn list_chapters(&self) -> Vec<ChapterListing> {
        self.chapters
            .catalog()
            .await
            .chapters()
            .iter()
            .map(|c| ChapterListing {
                id: c.id.clone(),
                title: c.title.clone(),
                key: c.key.clone(),
                question_count: c.question_count(),
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown chapter id.
    pub async fn resolve(&self, chapter_id: &ChapterId) -> Result<ResolvedChapter, CatalogError> {
        self.chapters
            .catalog()
            .await
            .chapter(chapter_id)
            .cloned()
            .ok_or(CatalogError::NotFound)
    }

    /// Add a chapter whose key is derived from its title.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle`, `CatalogError::DuplicateChapter`
    /// when the derived key is taken, or `CatalogError::Storage`.
    pub async fn add_chapter(&self, title: &str) -> Result<ChapterId, CatalogError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        let chapter = Chapter::new(title);
        let id = chapter.id.clone();
        match self.chapters.add(chapter).await {
            Ok(()) => Ok(id),
            Err(StorageError::Conflict) => Err(CatalogError::DuplicateChapter),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the question set served for `key`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the write fails.
    pub async fn import_question_set(
        &self,
        key: ChapterKey,
        questions: Vec<QuestionDefinition>,
    ) -> Result<(), CatalogError> {
        tracing::info!(%key, count = questions.len(), "importing question set");
        self.chapters.save_question_set(key, questions).await?;
        Ok(())
    }
}
