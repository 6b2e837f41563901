//! Versioned text model: immutable texts and the changes that reference them.
//!
//! Texts live in a [`TextTable`] and are referred to by [`TextId`]. Two
//! changes point at "the same" text only when they hold the same handle;
//! textually equal texts created independently stay distinct.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ops::Index;

use crate::stamp::Stamp;

/// Name of the default (unnamed) case.
pub const DEFAULT_CASE: &str = "";

/// An immutable snapshot of a string's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Text {
    content: String,
    case: String,
    stamp: Stamp,
}

impl Text {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

/// Opaque handle to a [`Text`] in a [`TextTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextId(usize);

/// Owner of every text in a project.
///
/// Interning is keyed on content, case and stamp, so reading the same
/// record twice (e.g. when restoring history) yields one handle.
#[derive(Debug, Default)]
pub struct TextTable {
    texts: Vec<Text>,
    index: HashMap<(String, String, Stamp), TextId>,
}

impl TextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the given text, inserting it if it is not known yet.
    pub fn intern(&mut self, content: &str, case: &str, stamp: Stamp) -> TextId {
        let key = (content.to_string(), case.to_string(), stamp);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }

        let id = TextId(self.texts.len());
        self.texts.push(Text {
            content: key.0.clone(),
            case: key.1.clone(),
            stamp,
        });
        self.index.insert(key, id);
        id
    }

    pub fn get(&self, id: TextId) -> Option<&Text> {
        self.texts.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

impl Index<TextId> for TextTable {
    type Output = Text;

    /// Handles are only ever issued by the table they index.
    fn index(&self, id: TextId) -> &Text {
        &self.texts[id.0]
    }
}

/// One historical version of a string in some language.
///
/// A change without `new_text` is a base-language version; with it, a
/// translation made against `base_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    string_name: String,
    case: String,
    base_text: TextId,
    new_text: Option<TextId>,
    stamp: Stamp,
    user: Option<String>,
    last_upload: bool,
}

impl Change {
    /// A new version of a base-language string.
    pub fn base(name: &str, case: &str, text: TextId, stamp: Stamp, user: Option<&str>) -> Self {
        Self {
            string_name: name.to_string(),
            case: case.to_string(),
            base_text: text,
            new_text: None,
            stamp,
            user: user.map(str::to_string),
            last_upload: false,
        }
    }

    /// A translation of `base_text`.
    pub fn translation(
        name: &str,
        case: &str,
        base_text: TextId,
        new_text: TextId,
        stamp: Stamp,
        user: Option<&str>,
    ) -> Self {
        Self {
            new_text: Some(new_text),
            ..Self::base(name, case, base_text, stamp, user)
        }
    }

    pub fn string_name(&self) -> &str {
        &self.string_name
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    pub fn base_text(&self) -> TextId {
        self.base_text
    }

    pub fn new_text(&self) -> Option<TextId> {
        self.new_text
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn last_upload(&self) -> bool {
        self.last_upload
    }

    pub fn is_translation(&self) -> bool {
        self.new_text.is_some()
    }

    /// The text this change contributes: the translation, or the base text.
    pub fn text(&self) -> TextId {
        self.new_text.unwrap_or(self.base_text)
    }

    /// Re-bind this change to `base_text` under a fresh stamp and user.
    ///
    /// The only mutation history permits: confirming that an existing
    /// version is still correct for the current base text.
    pub fn accept_as_current(&mut self, base_text: TextId, stamp: Stamp, user: Option<&str>) {
        self.base_text = base_text;
        self.stamp = stamp;
        self.user = user.map(str::to_string);
    }
}

/// All changes of one string in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringHistory {
    changes: Vec<Change>,
}

impl StringHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Append a change, keeping the history sorted by stamp.
    pub fn push(&mut self, change: Change) -> usize {
        let at = self.changes.partition_point(|c| c.stamp <= change.stamp);
        self.changes.insert(at, change);
        at
    }

    /// Newest base-language change for `case`.
    pub fn newest_base(&self, case: &str) -> Option<&Change> {
        self.changes
            .iter()
            .filter(|c| c.case == case && !c.is_translation())
            .max_by_key(|c| c.stamp)
    }

    /// Newest translation change for `case`.
    pub fn newest_translation(&self, case: &str) -> Option<&Change> {
        self.newest_translation_position(case).map(|at| &self.changes[at])
    }

    /// Position of the newest translation change for `case`.
    pub fn newest_translation_position(&self, case: &str) -> Option<usize> {
        self.changes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.case == case && c.is_translation())
            .max_by_key(|(_, c)| c.stamp)
            .map(|(at, _)| at)
    }

    /// Newest change of either kind for `case`.
    pub fn newest(&self, case: &str) -> Option<&Change> {
        self.changes
            .iter()
            .filter(|c| c.case == case)
            .max_by_key(|c| c.stamp)
    }

    /// Cases that have at least one change.
    pub fn cases(&self) -> BTreeSet<&str> {
        self.changes.iter().map(|c| c.case.as_str()).collect()
    }

    /// Make the change at `position` the only last upload of its case.
    pub fn flag_last_upload(&mut self, position: usize) {
        let case = self.changes[position].case.clone();
        for (i, change) in self.changes.iter_mut().enumerate() {
            if change.case == case {
                change.last_upload = i == position;
            }
        }
    }

    /// Restamp the change at `position` via [`Change::accept_as_current`].
    ///
    /// Returns the new position, as the history stays sorted by stamp.
    pub fn accept_as_current(
        &mut self,
        position: usize,
        base_text: TextId,
        stamp: Stamp,
        user: Option<&str>,
    ) -> usize {
        let mut change = self.changes.remove(position);
        change.accept_as_current(base_text, stamp, user);
        self.push(change)
    }
}
