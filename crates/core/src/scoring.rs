//! Binary multi-select scoring and the per-chapter aggregate.

use crate::model::{QuestionDefinition, SavedResponse, SelectionSet};

/// Points for an exact match.
pub const CORRECT_POINTS: i32 = 5;
/// Points for anything else, including an empty selection.
pub const WRONG_POINTS: i32 = -5;

/// Result of scoring one selection against one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub points: i32,
    /// Correct choice texts joined by `", "`, only for non-empty wrong selections.
    pub explanation: Option<String>,
}

impl ScoreOutcome {
    #[must_use]
    pub fn into_response(self, selected: SelectionSet) -> SavedResponse {
        SavedResponse::new(selected, self.points, self.explanation)
    }
}

/// Scores a selection. There is no partial credit.
///
/// - empty selection: `-5`, no explanation
/// - selection equal to the correct set: `+5`, no explanation
/// - anything else: `-5`, explanation lists the correct choices in definition order
#[must_use]
pub fn score(definition: &QuestionDefinition, selection: &SelectionSet) -> ScoreOutcome {
    if selection.is_empty() {
        return ScoreOutcome {
            points: WRONG_POINTS,
            explanation: None,
        };
    }

    if selection.as_set() == definition.correct() {
        return ScoreOutcome {
            points: CORRECT_POINTS,
            explanation: None,
        };
    }

    ScoreOutcome {
        points: WRONG_POINTS,
        explanation: Some(definition.correct_texts().join(", ")),
    }
}

/// Sums saved scores. Zero for no responses.
pub fn chapter_total<'a, I>(responses: I) -> i32
where
    I: IntoIterator<Item = &'a SavedResponse>,
{
    responses.into_iter().map(|r| r.score).sum()
}
