use serde::{Deserialize, Serialize};

use crate::model::question::SelectionSet;

/// The one submitted answer of a user to a question, with its score.
///
/// Once stored for a (user, chapter, question index) it is never replaced;
/// its presence locks the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResponse {
    pub selected: SelectionSet,
    pub score: i32,
    /// Correct choice texts, joined by `", "`. Only set for wrong answers.
    #[serde(rename = "goodTexts", default, skip_serializing_if = "Option::is_none")]
    pub good_texts: Option<String>,
}

impl SavedResponse {
    #[must_use]
    pub fn new(selected: SelectionSet, score: i32, good_texts: Option<String>) -> Self {
        Self {
            selected,
            score,
            good_texts,
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.score > 0
    }
}
