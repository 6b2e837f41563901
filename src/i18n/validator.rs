//! Grammar validation of parameterised strings.
//!
//! A string may embed commands between braces: parameter and colour
//! commands (`{NUM}`, `{1:STRING.nom}`, `{RED}`), plural and gender
//! selections (`{P car cars}`, `{G il elle}`) and a leading gender
//! assignment (`{G=f}`). This module checks them against the declaring
//! language's grammar and counts the critical commands so a translation can
//! be compared with its base string.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use crate::i18n::commands::{CommandInfo, CommandRegistry};
use crate::i18n::grammar::Grammar;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while reading or validating text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,

    /// 1-based line in the language file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.line {
            Some(line) => write!(f, "line {}: {}: {}", line, severity, self.message),
            None => write!(f, "{}: {}", severity, self.message),
        }
    }
}

/// Result of validating one string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Errors and warnings, in scan order
    pub diagnostics: Vec<Diagnostic>,

    /// Occurrences of each critical command
    pub critical: BTreeMap<String, usize>,

    /// Gender assigned by a leading `{G=..}`
    pub gender: Option<String>,

    /// Number of `{P ..}` selections
    pub plural_selections: usize,

    /// Number of `{G ..}` selections
    pub gender_selections: usize,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.is_error())
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Describe how the critical command counts differ from `base`, if they do.
    pub fn critical_mismatch(&self, base: &ValidationReport) -> Option<String> {
        if self.critical == base.critical {
            return None;
        }

        let names: BTreeSet<&String> = self.critical.keys().chain(base.critical.keys()).collect();
        let parts: Vec<String> = names
            .into_iter()
            .filter_map(|name| {
                let expected = base.critical.get(name).copied().unwrap_or(0);
                let found = self.critical.get(name).copied().unwrap_or(0);
                (expected != found).then(|| {
                    format!("{{{}}}: base has {}, translation has {}", name, expected, found)
                })
            })
            .collect();

        Some(format!("Parameter mismatch: {}", parts.join("; ")))
    }

    fn error(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::error(message));
    }

    fn warning(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::warning(message));
    }
}

// Regex patterns for command heads (cached for performance)
static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();
static GENDER_ASSIGN_REGEX: OnceLock<Regex> = OnceLock::new();

fn command_regex() -> &'static Regex {
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r"^\{(?:(\d+):)?([A-Za-z0-9_]+)(?:\.([A-Za-z0-9_]+))?\}").unwrap()
    })
}

fn gender_assign_regex() -> &'static Regex {
    GENDER_ASSIGN_REGEX.get_or_init(|| Regex::new(r"^\{G=([^\s{}]*)\}").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Plural,
    Gender,
}

impl Selection {
    fn detect(rest: &str) -> Option<Self> {
        let bytes = rest.as_bytes();
        if !matches!(bytes.get(2), Some(b' ' | b'\t' | b'}')) {
            return None;
        }
        match bytes.get(1) {
            Some(b'P') => Some(Selection::Plural),
            Some(b'G') => Some(Selection::Gender),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            Selection::Plural => 'P',
            Selection::Gender => 'G',
        }
    }
}

/// Validator for the command grammar of one language.
pub struct GrammarValidator<'a> {
    commands: &'a CommandRegistry,
    grammar: &'a Grammar,
}

#[derive(Default)]
struct ScanState {
    numeric_params: bool,
    text_params: bool,
}

impl<'a> GrammarValidator<'a> {
    pub fn new(commands: &'a CommandRegistry, grammar: &'a Grammar) -> Self {
        Self { commands, grammar }
    }

    /// Validate the text of one string.
    ///
    /// `is_default_case` tells whether the string is the default case (a
    /// gender assignment is only legal there). Scanning stops at the first
    /// unrecognised command.
    pub fn validate(&self, text: &str, is_default_case: bool) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut state = ScanState::default();
        let mut pos = 0;

        while let Some(offset) = text[pos..].find('{') {
            let start = pos + offset;
            let rest = &text[start..];

            if rest.starts_with("{{}") {
                pos = start + 3;
                continue;
            }
            if rest.starts_with("{}") {
                pos = start + 2;
                continue;
            }

            if let Some(caps) = gender_assign_regex().captures(rest) {
                self.check_gender_assignment(&caps[1], start, is_default_case, &mut report);
                pos = start + caps[0].len();
                continue;
            }

            if let Some(selection) = Selection::detect(rest) {
                match parse_arguments(&rest[2..]) {
                    Some((args, consumed)) => {
                        self.check_selection(selection, &args, &mut report);
                        pos = start + 2 + consumed;
                        continue;
                    }
                    None => {
                        report.error(format!(
                            "Unterminated {{{} ..}} command",
                            selection.letter()
                        ));
                        break;
                    }
                }
            }

            if let Some(caps) = command_regex().captures(rest) {
                if let Some(info) = self.commands.get(&caps[2]) {
                    self.check_command(
                        info,
                        caps.get(1).is_some(),
                        caps.get(3).map(|m| m.as_str()),
                        &mut state,
                        &mut report,
                    );
                    pos = start + caps[0].len();
                    continue;
                }
            }

            let snippet = match rest.find('}') {
                Some(end) => &rest[..=end],
                None => rest,
            };
            report.error(format!("Unknown command \"{}\"", snippet));
            break;
        }

        if report.plural_selections > 0 && !state.numeric_params {
            report.warning("Plural selection without a numeric parameter".to_string());
        }
        if report.gender_selections > 0 && !state.text_params {
            report.warning("Gender selection without a string parameter".to_string());
        }

        report
    }

    fn check_gender_assignment(
        &self,
        gender: &str,
        offset: usize,
        is_default_case: bool,
        report: &mut ValidationReport,
    ) {
        if offset != 0 {
            report.error("{G=..} must be at the start of the string".to_string());
        } else if !is_default_case {
            report.error("{G=..} is only allowed in the default case".to_string());
        } else if !self.grammar.has_gender(gender) {
            report.error(format!("Gender \"{}\" is not declared", gender));
        } else {
            report.gender = Some(gender.to_string());
        }
    }

    fn check_selection(&self, selection: Selection, args: &[String], report: &mut ValidationReport) {
        let required = match selection {
            Selection::Plural => {
                report.plural_selections += 1;
                self.grammar.plural_count()
            }
            Selection::Gender => {
                report.gender_selections += 1;
                self.grammar.genders.len()
            }
        };

        if required == 0 {
            let message = match selection {
                Selection::Plural => "{P ..} used but no plural form is declared",
                Selection::Gender => "{G ..} used but no genders are declared",
            };
            report.error(message.to_string());
            return;
        }

        let found = args.len();
        let numeric_lead = found == required + 1
            && !args[0].is_empty()
            && args[0].bytes().all(|b| b.is_ascii_digit());
        if found != required && !numeric_lead {
            report.error(format!(
                "{{{} ..}} expects {} forms, found {}",
                selection.letter(),
                required,
                found
            ));
        }
    }

    fn check_command(
        &self,
        info: &CommandInfo,
        indexed: bool,
        case: Option<&str>,
        state: &mut ScanState,
        report: &mut ValidationReport,
    ) {
        if indexed && info.arity() == 0 {
            report.error(format!("{{{}}} takes no parameter and cannot be numbered", info.name));
        }

        if let Some(case) = case {
            if !info.allow_case {
                report.error(format!("{{{}}} does not accept a case", info.name));
            } else if !self.grammar.has_case(case) {
                report.error(format!("Case \"{}\" is not declared", case));
            }
        }

        if info.critical {
            *report.critical.entry(info.name.to_string()).or_insert(0) += 1;
        }
        state.numeric_params |= info.accepts_plural();
        state.text_params |= info.accepts_gender();
    }
}

/// Read a whitespace separated argument list up to the closing brace.
///
/// Returns the arguments (quotes stripped) and the number of bytes consumed
/// including the brace, or `None` when the list never closes.
fn parse_arguments(s: &str) -> Option<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut chars = s.char_indices().peekable();

    loop {
        while chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}

        match chars.next()? {
            (i, '}') => return Some((args, i + 1)),
            (_, '"') => {
                let mut arg = String::new();
                loop {
                    match chars.next()? {
                        (_, '"') => break,
                        (_, c) => arg.push(c),
                    }
                }
                args.push(arg);
            }
            (_, first) => {
                let mut arg = String::from(first);
                while let Some((_, c)) = chars.next_if(|&(_, c)| !c.is_whitespace() && c != '}') {
                    arg.push(c);
                }
                args.push(arg);
            }
        }
    }
}
