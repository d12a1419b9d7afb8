use qcm_core::model::{
    ChapterId, ChapterKey, ResolvedChapter, SavedResponse, SelectionSet, User, UserId,
};
use qcm_core::scoring::{chapter_total, score};
use qcm_core::time::Clock;
use storage::answers::ChapterResponses;
use storage::{AnswerStore, UserStore};

use crate::catalog_service::CatalogService;
use crate::error::{CatalogError, QuizError};

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// A chapter as shown to a user with access: questions, saved answers and total.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterSheet {
    pub chapter: ResolvedChapter,
    pub responses: ChapterResponses,
    pub total: i32,
}

impl ChapterSheet {
    /// Answered questions are locked.
    #[must_use]
    pub fn is_locked(&self, question_index: u32) -> bool {
        self.responses.contains_key(&question_index)
    }
}

/// Outcome of a submission, with the chapter total recomputed after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub response: SavedResponse,
    pub chapter_total: i32,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Gated access to chapters, write-once answer submission and chapter totals.
///
/// The access gate is re-evaluated against the clock on every call since
/// access can lapse without any stored data changing.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    users: UserStore,
    answers: AnswerStore,
    catalog: CatalogService,
}

impl QuizService {
    #[must_use]
    pub fn new(clock: Clock, users: UserStore, answers: AnswerStore, catalog: CatalogService) -> Self {
        Self {
            clock,
            users,
            answers,
            catalog,
        }
    }

    async fn gated_user(&self, user_id: &UserId) -> Result<User, QuizError> {
        let user = self.users.find(user_id).await.ok_or(QuizError::UserNotFound)?;
        if !user.has_access(self.clock.now()) {
            return Err(QuizError::AccessDenied);
        }
        Ok(user)
    }

    async fn resolve(&self, chapter_id: &ChapterId) -> Result<ResolvedChapter, QuizError> {
        self.catalog.resolve(chapter_id).await.map_err(|err| match err {
            CatalogError::Storage(e) => QuizError::Storage(e),
            _ => QuizError::ChapterNotFound,
        })
    }

    /// Load a chapter with the user's saved answers.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UserNotFound`, `QuizError::AccessDenied` or
    /// `QuizError::ChapterNotFound`.
    pub async fn open_chapter(
        &self,
        user_id: &UserId,
        chapter_id: &ChapterId,
    ) -> Result<ChapterSheet, QuizError> {
        let user = self.gated_user(user_id).await?;
        let chapter = self.resolve(chapter_id).await?;
        let responses = self.answers.chapter_responses(&user.id, &chapter.key).await;
        let total = chapter_total(responses.values());
        Ok(ChapterSheet {
            chapter,
            responses,
            total,
        })
    }

    /// Score and store the user's one answer to a question.
    ///
    /// An already answered question is rejected without re-scoring. An empty
    /// selection is accepted and scores as wrong.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UserNotFound`, `QuizError::AccessDenied`,
    /// `QuizError::ChapterNotFound`, `QuizError::QuestionNotFound`,
    /// `QuizError::AlreadyAnswered`, `QuizError::InvalidSelection` for letters
    /// past the last choice, or `QuizError::Storage` if the write fails.
    pub async fn submit_answer(
        &self,
        user_id: &UserId,
        chapter_id: &ChapterId,
        question_index: u32,
        selection: SelectionSet,
    ) -> Result<SubmittedAnswer, QuizError> {
        let user = self.gated_user(user_id).await?;
        let chapter = self.resolve(chapter_id).await?;
        let question = chapter
            .question(question_index)
            .ok_or(QuizError::QuestionNotFound {
                index: question_index,
            })?;

        if self
            .answers
            .get(&user.id, &chapter.key, question_index)
            .await
            .is_some()
        {
            return Err(QuizError::AlreadyAnswered {
                index: question_index,
            });
        }

        question.check_selection(&selection)?;
        let response = score(question, &selection).into_response(selection);

        self.answers
            .put(&user.id, &chapter.key, question_index, response.clone())
            .await?;
        let total = self.chapter_total(&user.id, &chapter.key).await;

        tracing::info!(
            user = %user.id,
            chapter = %chapter.key,
            question_index,
            points = response.score,
            total,
            "answer recorded"
        );

        Ok(SubmittedAnswer {
            response,
            chapter_total: total,
        })
    }

    pub async fn saved_response(
        &self,
        user_id: &UserId,
        chapter_key: &ChapterKey,
        question_index: u32,
    ) -> Option<SavedResponse> {
        self.answers.get(user_id, chapter_key, question_index).await
    }

    /// Sum of the user's scores in a chapter, read fresh from storage.
    pub async fn chapter_total(&self, user_id: &UserId, chapter_key: &ChapterKey) -> i32 {
        let responses = self.answers.chapter_responses(user_id, chapter_key).await;
        chapter_total(responses.values())
    }
}
