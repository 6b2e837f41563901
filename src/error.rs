//! Error types for the translation ledger.
//!
//! Problems found while reading language file text are accumulated as
//! [`Diagnostic`](crate::i18n::Diagnostic) values and never raised. The
//! enums here cover the cases where an operation refuses to proceed.

use thiserror::Error;

use crate::i18n::Diagnostic;

/// A stamp could not be read back from its textual form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StampError {
    #[error("stamp `{raw}` does not match the expected pattern")]
    Pattern { raw: String },

    #[error("stamp `{raw}` has invalid calendar fields")]
    Calendar { raw: String },

    #[error("stamp `{raw}` lies in the future")]
    Future { raw: String },
}

/// An upload was refused before any change was made.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("language `{0}` is not part of the project")]
    UnknownLanguage(String),

    #[error("file declares `{found}` but was uploaded as `{expected}`")]
    LanguageMismatch { expected: String, found: String },

    #[error("translation for `{0}` uploaded before any base language file")]
    NoBase(String),

    #[error("upload for `{language}` rejected with {} error(s)", .errors.len())]
    Invalid {
        language: String,
        errors: Vec<Diagnostic>,
    },
}

/// A project-level operation referred to something that does not exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("language `{0}` is not part of the project")]
    UnknownLanguage(String),

    #[error("language `{0}` is not a known language")]
    UnsupportedLanguage(String),

    #[error("language `{0}` already exists")]
    DuplicateLanguage(String),

    #[error("string `{0}` does not exist in the base language")]
    UnknownString(String),

    #[error("no translation of `{name}` (case `{case}`) to accept")]
    NothingToAccept { name: String, case: String },

    #[error("operation not available for the base language `{0}`")]
    BaseLanguage(String),
}
