//! Translation status classification.
//!
//! Decides, per string and case, whether a translation is current, stale,
//! structurally broken or absent, relative to the current base text.

use serde::Serialize;
use std::fmt;

use crate::i18n::{Diagnostic, GrammarValidator, ValidationReport};
use crate::model::{StringHistory, TextId, TextTable, DEFAULT_CASE};
use crate::stamp::Stamp;

/// State of one translated case, in ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// A named case with no (or empty) translation, which is allowed
    MissingOk = 0,
    Unknown = 1,
    UpToDate = 2,
    OutOfDate = 3,
    Invalid = 4,
    /// The default case has no translation
    Missing = 5,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::MissingOk,
        Status::Unknown,
        Status::UpToDate,
        Status::OutOfDate,
        Status::Invalid,
        Status::Missing,
    ];

    pub fn severity(self) -> u8 {
        self as u8
    }

    /// Most severe of the given states.
    pub fn worst(states: impl IntoIterator<Item = Status>) -> Option<Status> {
        states.into_iter().max()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::MissingOk => "Optional",
            Status::Unknown => "Unknown",
            Status::UpToDate => "Up to date",
            Status::OutOfDate => "Out of date",
            Status::Invalid => "Invalid",
            Status::Missing => "Missing",
        };
        f.write_str(label)
    }
}

/// The base text a translation is judged against.
#[derive(Debug, Clone)]
pub struct CurrentBase {
    /// Newest default-case base text
    pub text: TextId,

    /// Stamp of the base change holding `text`
    pub stamp: Stamp,

    /// Validation of `text` under the base language's grammar
    pub report: ValidationReport,
}

/// Classification of one case of one string.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub case: String,
    pub status: Status,
    pub diagnostics: Vec<Diagnostic>,
}

/// Classify the newest translation of `case` in `history`.
///
/// `validator` carries the translating language's grammar. `current_base` is
/// `None` when the base language has no text for the string, which leaves
/// the state undecidable.
pub fn classify(
    history: &StringHistory,
    case: &str,
    current_base: Option<&CurrentBase>,
    texts: &TextTable,
    validator: &GrammarValidator<'_>,
) -> StatusReport {
    let report = |status, diagnostics| StatusReport {
        case: case.to_string(),
        status,
        diagnostics,
    };

    let Some(change) = history.newest_translation(case) else {
        let status = if case == DEFAULT_CASE {
            Status::Missing
        } else {
            Status::MissingOk
        };
        return report(status, Vec::new());
    };

    let content = texts[change.text()].content();
    if case != DEFAULT_CASE && content.is_empty() {
        return report(Status::MissingOk, Vec::new());
    }

    let Some(base) = current_base else {
        return report(
            Status::Unknown,
            vec![Diagnostic::warning("The base language has no text for this string")],
        );
    };

    let validation = validator.validate(content, case == DEFAULT_CASE);
    let mut diagnostics = validation.diagnostics.clone();

    let stale = change.base_text() != base.text
        || change.stamp() < base.stamp
        || change.stamp() < texts[base.text].stamp();
    let mut status = if stale {
        Status::OutOfDate
    } else {
        Status::UpToDate
    };

    if let Some(mismatch) = validation.critical_mismatch(&base.report) {
        diagnostics.push(Diagnostic::error(mismatch));
        status = Status::Invalid;
    }

    report(status, diagnostics)
}
