//! Language grammar support for game-string files.
//!
//! This module holds everything that knows what a language file's strings
//! may contain. The rest of the crate treats a string as plain text plus
//! the [`ValidationReport`] produced here.
//!
//! # Architecture
//!
//! - `registry`: Known languages (ISO code and grf language id) and plural form rules
//! - `grammar`: The `##plural` / `##gender` / `##case` declarations of one file
//! - `commands`: Parameter commands that may appear between braces
//! - `validator`: Scans a string's commands and checks them against a grammar
//! - `metrics`: Counters describing what uploads did to the history
//!
//! # Example
//!
//! ```rust,ignore
//! use string_ledger::i18n::{CommandRegistry, Grammar, GrammarValidator};
//!
//! let grammar = Grammar { plural: Some(0), ..Grammar::default() };
//! let report = GrammarValidator::new(CommandRegistry::builtin(), &grammar)
//!     .validate("{NUM} {P car cars}", true);
//! assert!(!report.has_errors());
//! ```

mod commands;
mod grammar;
mod metrics;
mod registry;
mod validator;

pub use commands::{ArgKind, CommandInfo, CommandRegistry};
pub use grammar::Grammar;
pub use metrics::{MetricsReport, UploadMetrics};
pub use registry::{LanguageConfig, LanguageRegistry, PluralForm, PLURAL_FORMS};
pub use validator::{Diagnostic, GrammarValidator, Severity, ValidationReport};
