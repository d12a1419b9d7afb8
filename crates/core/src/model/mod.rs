mod chapter;
mod ids;
mod payment;
mod question;
mod response;
mod user;

pub use chapter::{Catalog, Chapter, QuestionBank, ResolvedChapter, default_chapters};
pub use ids::{ChapterId, ChapterKey, ParseIdError, UserId};
pub use payment::{PaymentSettings, TransactionIdError};
pub use question::{ChoiceLetter, MAX_CHOICES, QuestionDefinition, QuestionError, SelectionSet};
pub use response::SavedResponse;
pub use user::{AccessStatus, User, UserError};
