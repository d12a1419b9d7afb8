#![forbid(unsafe_code)]

pub mod answers;
pub mod chapters;
pub mod repository;
pub mod sqlite;
pub mod users;

pub use answers::AnswerStore;
pub use chapters::ChapterStore;
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
pub use users::{AuthSessionStore, UserStore};
