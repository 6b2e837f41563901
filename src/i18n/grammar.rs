//! Grammar declarations of a language file (`##plural`, `##gender`, `##case`).

use serde::Serialize;

use crate::i18n::registry::PLURAL_FORMS;

/// Plural, gender and case declarations that govern parameterised strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Grammar {
    /// Plural form id, `None` if the file never declared one.
    pub plural: Option<u8>,

    /// Declared genders, in declaration order.
    pub genders: Vec<String>,

    /// Declared named cases, in declaration order. The default case is implicit.
    pub cases: Vec<String>,
}

impl Grammar {
    /// Number of forms a `{P ..}` selection must list (0 if undeclared).
    pub fn plural_count(&self) -> usize {
        self.plural
            .and_then(|id| PLURAL_FORMS.get(usize::from(id)))
            .map(|form| form.count)
            .unwrap_or(0)
    }

    pub fn has_gender(&self, gender: &str) -> bool {
        self.genders.iter().any(|g| g == gender)
    }

    pub fn has_case(&self, case: &str) -> bool {
        self.cases.iter().any(|c| c == case)
    }
}
