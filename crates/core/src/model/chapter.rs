use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::ids::{ChapterId, ChapterKey};
use crate::model::question::QuestionDefinition;

/// Question sets keyed by the chapter they belong to.
pub type QuestionBank = BTreeMap<ChapterKey, Vec<QuestionDefinition>>;

/// A named group of questions as listed in the catalog.
///
/// `qcms` holds questions authored inline with the chapter; a question-bank
/// entry under the same key takes precedence when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<ChapterKey>,
    #[serde(default)]
    pub qcms: Vec<QuestionDefinition>,
}

impl Chapter {
    /// New chapter whose key is derived from its title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ChapterId::generate(),
            title: title.into(),
            key: None,
            qcms: Vec::new(),
        }
    }

    /// New chapter pinned to an explicit key.
    #[must_use]
    pub fn with_key(title: impl Into<String>, key: ChapterKey) -> Self {
        Self {
            key: Some(key),
            ..Self::new(title)
        }
    }

    #[must_use]
    pub fn key(&self) -> ChapterKey {
        self.key
            .clone()
            .unwrap_or_else(|| ChapterKey::from_title(&self.title))
    }
}

/// The chapters seeded into an empty catalog.
#[must_use]
pub fn default_chapters() -> Vec<Chapter> {
    vec![
        Chapter::with_key("Glucides", ChapterKey::new("glucides")),
        Chapter::with_key("Lipides", ChapterKey::new("lipides")),
        Chapter::with_key(
            "Acides aminés, peptides et protéines",
            ChapterKey::new("acides-aminés"),
        ),
        Chapter::with_key("Acides nucléiques", ChapterKey::new("acides-nucleiques")),
    ]
}

/// A chapter with its key and question list settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChapter {
    pub id: ChapterId,
    pub title: String,
    pub key: ChapterKey,
    pub questions: Arc<[QuestionDefinition]>,
}

impl ResolvedChapter {
    #[must_use]
    pub fn question(&self, index: u32) -> Option<&QuestionDefinition> {
        usize::try_from(index).ok().and_then(|i| self.questions.get(i))
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// Chapters resolved once against the question bank, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    chapters: Vec<ResolvedChapter>,
    by_id: HashMap<ChapterId, usize>,
}

impl Catalog {
    #[must_use]
    pub fn build(chapters: Vec<Chapter>, bank: &QuestionBank) -> Self {
        let mut resolved = Vec::with_capacity(chapters.len());
        let mut by_id = HashMap::with_capacity(chapters.len());

        for chapter in chapters {
            let key = chapter.key();
            let questions: Arc<[QuestionDefinition]> = match bank.get(&key) {
                Some(set) => set.as_slice().into(),
                None => chapter.qcms.into(),
            };
            by_id.insert(chapter.id.clone(), resolved.len());
            resolved.push(ResolvedChapter {
                id: chapter.id,
                title: chapter.title,
                key,
                questions,
            });
        }

        Self {
            chapters: resolved,
            by_id,
        }
    }

    #[must_use]
    pub fn chapter(&self, id: &ChapterId) -> Option<&ResolvedChapter> {
        self.by_id.get(id).map(|&i| &self.chapters[i])
    }

    #[must_use]
    pub fn chapters(&self) -> &[ResolvedChapter] {
        &self.chapters
    }
}
