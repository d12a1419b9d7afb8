use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Choices are lettered A..=Z, so a question can carry at most this many.
pub const MAX_CHOICES: usize = 26;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question must offer at least one choice")]
    NoChoices,

    #[error("question offers {0} choices, at most {MAX_CHOICES} can be lettered")]
    TooManyChoices(usize),

    #[error("question must have at least one correct choice")]
    NoCorrectChoice,

    #[error("correct letter {0} does not address any choice")]
    CorrectLetterOutOfRange(ChoiceLetter),

    #[error("correct letter {0} is listed twice")]
    DuplicateCorrectLetter(ChoiceLetter),

    #[error("selected letter {0} does not address any choice")]
    SelectionOutOfRange(ChoiceLetter),

    #[error("invalid choice letter: {0:?}")]
    InvalidLetter(String),
}

//
// ─── CHOICE LETTER ─────────────────────────────────────────────────────────────
//

/// Alphabetic label of a choice, derived from its zero-based position
/// (0 → `A`, 1 → `B`, …).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChoiceLetter(u8);

impl ChoiceLetter {
    /// # Errors
    ///
    /// Returns `QuestionError::TooManyChoices` when `position` is past `Z`.
    pub fn from_position(position: usize) -> Result<Self, QuestionError> {
        u8::try_from(position)
            .ok()
            .filter(|p| usize::from(*p) < MAX_CHOICES)
            .map(Self)
            .ok_or(QuestionError::TooManyChoices(position.saturating_add(1)))
    }

    #[must_use]
    pub fn position(self) -> usize {
        usize::from(self.0)
    }

    #[must_use]
    pub fn as_char(self) -> char {
        char::from(b'A' + self.0)
    }
}

impl TryFrom<char> for ChoiceLetter {
    type Error = QuestionError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        if c.is_ascii_uppercase() {
            // ASCII uppercase fits in a byte.
            Ok(Self(c as u8 - b'A'))
        } else {
            Err(QuestionError::InvalidLetter(c.to_string()))
        }
    }
}

impl FromStr for ChoiceLetter {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c),
            _ => Err(QuestionError::InvalidLetter(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChoiceLetter {
    type Error = QuestionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ChoiceLetter> for String {
    fn from(letter: ChoiceLetter) -> Self {
        letter.as_char().to_string()
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl fmt::Debug for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceLetter({})", self.as_char())
    }
}

//
// ─── SELECTION SET ─────────────────────────────────────────────────────────────
//

/// Letters a user ticked for one question. Unordered, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<ChoiceLetter>);

impl SelectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses letters such as `["A", "C"]`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidLetter` for anything that is not a single `A..=Z`.
    pub fn parse<I, S>(letters: I) -> Result<Self, QuestionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        letters
            .into_iter()
            .map(|l| l.as_ref().parse::<ChoiceLetter>())
            .collect()
    }

    /// Adds the letter if absent, removes it otherwise.
    pub fn toggle(&mut self, letter: ChoiceLetter) {
        if !self.0.remove(&letter) {
            self.0.insert(letter);
        }
    }

    #[must_use]
    pub fn contains(&self, letter: ChoiceLetter) -> bool {
        self.0.contains(&letter)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChoiceLetter> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn as_set(&self) -> &BTreeSet<ChoiceLetter> {
        &self.0
    }
}

impl FromIterator<ChoiceLetter> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = ChoiceLetter>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

//
// ─── QUESTION DEFINITION ───────────────────────────────────────────────────────
//

/// An immutable multiple-choice question from the content catalog.
///
/// Serialized in the catalog's compact shape: `{"q": prompt, "r": [choices], "c": [letters]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion")]
pub struct QuestionDefinition {
    #[serde(rename = "q")]
    prompt: String,
    #[serde(rename = "r")]
    choices: Vec<String>,
    #[serde(rename = "c")]
    correct: BTreeSet<ChoiceLetter>,
}

#[derive(Deserialize)]
struct RawQuestion {
    q: String,
    r: Vec<String>,
    c: Vec<ChoiceLetter>,
}

impl TryFrom<RawQuestion> for QuestionDefinition {
    type Error = QuestionError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        Self::new(raw.q, raw.r, raw.c)
    }
}

impl QuestionDefinition {
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are no choices or
    /// more than [`MAX_CHOICES`], or the correct letters are empty, repeated,
    /// or point past the last choice.
    pub fn new(
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct: impl IntoIterator<Item = ChoiceLetter>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if choices.is_empty() {
            return Err(QuestionError::NoChoices);
        }
        if choices.len() > MAX_CHOICES {
            return Err(QuestionError::TooManyChoices(choices.len()));
        }

        let mut set = BTreeSet::new();
        for letter in correct {
            if letter.position() >= choices.len() {
                return Err(QuestionError::CorrectLetterOutOfRange(letter));
            }
            if !set.insert(letter) {
                return Err(QuestionError::DuplicateCorrectLetter(letter));
            }
        }
        if set.is_empty() {
            return Err(QuestionError::NoCorrectChoice);
        }

        Ok(Self {
            prompt,
            choices,
            correct: set,
        })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct(&self) -> &BTreeSet<ChoiceLetter> {
        &self.correct
    }

    #[must_use]
    pub fn is_correct(&self, letter: ChoiceLetter) -> bool {
        self.correct.contains(&letter)
    }

    /// Choices paired with their letters, in definition order.
    pub fn lettered_choices(&self) -> impl Iterator<Item = (ChoiceLetter, &str)> + '_ {
        // `new` caps choices at MAX_CHOICES, so every position fits a u8 letter.
        self.choices
            .iter()
            .enumerate()
            .filter_map(|(i, text)| ChoiceLetter::from_position(i).ok().map(|l| (l, text.as_str())))
    }

    /// Text of every correct choice, in definition order.
    #[must_use]
    pub fn correct_texts(&self) -> Vec<&str> {
        self.lettered_choices()
            .filter(|(letter, _)| self.is_correct(*letter))
            .map(|(_, text)| text)
            .collect()
    }

    /// Checks that every selected letter addresses an existing choice.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::SelectionOutOfRange` for the first stray letter.
    pub fn check_selection(&self, selection: &SelectionSet) -> Result<(), QuestionError> {
        match selection.iter().find(|l| l.position() >= self.choices.len()) {
            Some(letter) => Err(QuestionError::SelectionOutOfRange(letter)),
            None => Ok(()),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> ChoiceLetter {
        ChoiceLetter::try_from(c).unwrap()
    }

    fn sample() -> QuestionDefinition {
        QuestionDefinition::new(
            "X",
            vec!["A1".into(), "A2".into(), "A3".into()],
            [letter('A'), letter('C')],
        )
        .unwrap()
    }

    #[test]
    fn letters_follow_position() {
        assert_eq!(ChoiceLetter::from_position(0).unwrap().as_char(), 'A');
        assert_eq!(ChoiceLetter::from_position(25).unwrap().as_char(), 'Z');
        assert!(matches!(
            ChoiceLetter::from_position(26),
            Err(QuestionError::TooManyChoices(27))
        ));
    }

    #[test]
    fn letter_parsing_is_strict() {
        assert_eq!("B".parse::<ChoiceLetter>().unwrap().position(), 1);
        assert!("b".parse::<ChoiceLetter>().is_err());
        assert!("AB".parse::<ChoiceLetter>().is_err());
        assert!("".parse::<ChoiceLetter>().is_err());
    }

    #[test]
    fn selection_toggle_adds_and_removes() {
        let mut sel = SelectionSet::new();
        sel.toggle(letter('B'));
        sel.toggle(letter('A'));
        assert_eq!(sel.len(), 2);
        sel.toggle(letter('B'));
        assert!(!sel.contains(letter('B')));
        assert!(sel.contains(letter('A')));
    }

    #[test]
    fn selection_parse_dedups() {
        let sel = SelectionSet::parse(["C", "A", "C"]).unwrap();
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn correct_texts_keep_definition_order() {
        assert_eq!(sample().correct_texts(), vec!["A1", "A3"]);
    }

    #[test]
    fn rejects_out_of_range_correct_letter() {
        let err = QuestionDefinition::new("X", vec!["only".into()], [letter('B')]).unwrap_err();
        assert_eq!(err, QuestionError::CorrectLetterOutOfRange(letter('B')));
    }

    #[test]
    fn rejects_duplicate_or_missing_correct_letters() {
        let dup = QuestionDefinition::new("X", vec!["a".into()], [letter('A'), letter('A')]);
        assert_eq!(dup.unwrap_err(), QuestionError::DuplicateCorrectLetter(letter('A')));

        let none = QuestionDefinition::new("X", vec!["a".into()], []);
        assert_eq!(none.unwrap_err(), QuestionError::NoCorrectChoice);
    }

    #[test]
    fn rejects_more_than_twenty_six_choices() {
        let choices = (0..27).map(|i| i.to_string()).collect();
        let err = QuestionDefinition::new("X", choices, [letter('A')]).unwrap_err();
        assert_eq!(err, QuestionError::TooManyChoices(27));
    }

    #[test]
    fn check_selection_flags_stray_letters() {
        let q = sample();
        let ok = SelectionSet::parse(["A", "B"]).unwrap();
        assert!(q.check_selection(&ok).is_ok());
        let stray = SelectionSet::parse(["D"]).unwrap();
        assert_eq!(
            q.check_selection(&stray).unwrap_err(),
            QuestionError::SelectionOutOfRange(letter('D'))
        );
    }

    #[test]
    fn deserializes_catalog_shape() {
        let q: QuestionDefinition =
            serde_json::from_str(r#"{"q":"X","r":["A1","A2","A3"],"c":["A","C"]}"#).unwrap();
        assert_eq!(q, sample());
    }

    #[test]
    fn deserialize_validates() {
        let res: Result<QuestionDefinition, _> =
            serde_json::from_str(r#"{"q":"X","r":["A1"],"c":["C"]}"#);
        assert!(res.is_err());
    }
}
