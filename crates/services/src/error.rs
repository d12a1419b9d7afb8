//! Shared error types for the services crate.

use thiserror::Error;

use qcm_core::model::{QuestionError, TransactionIdError, UserError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("user not found")]
    UserNotFound,
    #[error("paid access required")]
    AccessDenied,
    #[error("chapter not found")]
    ChapterNotFound,
    #[error("question {index} not found")]
    QuestionNotFound { index: u32 },
    #[error("question {index} has already been answered")]
    AlreadyAnswered { index: u32 },
    #[error(transparent)]
    InvalidSelection(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("chapter not found")]
    NotFound,
    #[error("chapter title cannot be empty")]
    EmptyTitle,
    #[error("a chapter with this name already exists")]
    DuplicateChapter,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AccountService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccountError {
    #[error("email is already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PaymentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PaymentError {
    #[error(transparent)]
    InvalidTransactionId(#[from] TransactionIdError),
    #[error("user not found")]
    UserNotFound,
    #[error("payment activation was interrupted: {0}")]
    Interrupted(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {var}: {raw}")]
    Invalid { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
