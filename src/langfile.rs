//! Language file reading and writing.
//!
//! A language file is line oriented UTF-8:
//!
//! ```text
//! ##grflangid 0x03
//! ##plural 2
//! ##gender m f
//! ##case nom gen
//! ; comments and blank lines are kept as layout
//! STR_CAR        :{G=f}Voiture
//! STR_CAR.gen    :de la voiture
//! ```
//!
//! Pragmas must precede the first string. Parsing never stops early: every
//! problem becomes a [`Diagnostic`] and callers decide whether to reject the
//! file (see [`ParsedLanguage::has_errors`]).

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::debug;

use crate::i18n::{
    CommandRegistry, Diagnostic, Grammar, GrammarValidator, LanguageConfig, LanguageRegistry,
    ValidationReport, PLURAL_FORMS,
};
use crate::model::DEFAULT_CASE;

/// One line of a file's layout template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonEntry {
    /// Blank or comment line, reproduced verbatim
    Literal(String),
    /// Position of a string's default-case line (and its case lines)
    StringSlot(String),
    LangId(String),
    Plural(u8),
    Case(Vec<String>),
    Gender(Vec<String>),
}

impl SkeletonEntry {
    fn is_pragma(&self) -> bool {
        matches!(
            self,
            SkeletonEntry::LangId(_)
                | SkeletonEntry::Plural(_)
                | SkeletonEntry::Case(_)
                | SkeletonEntry::Gender(_)
        )
    }
}

/// One string line of a file.
#[derive(Debug, Clone)]
pub struct ParsedString {
    pub name: String,

    /// Case name, [`DEFAULT_CASE`] for the default line
    pub case: String,

    pub text: String,

    /// 1-based line number
    pub line: usize,

    /// Grammar validation of `text` against the file's declarations
    pub report: ValidationReport,
}

/// Everything read from one language file.
#[derive(Debug, Clone, Default)]
pub struct ParsedLanguage {
    /// Language named by `##grflangid`
    pub language: Option<&'static LanguageConfig>,

    pub grammar: Grammar,

    pub skeleton: Vec<SkeletonEntry>,

    /// Strings in file order
    pub strings: Vec<ParsedString>,

    /// All diagnostics, string validation included
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedLanguage {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error()).cloned().collect()
    }

    pub fn isocode(&self) -> Option<&'static str> {
        self.language.map(|config| config.isocode)
    }

    pub fn get(&self, name: &str, case: &str) -> Option<&ParsedString> {
        self.strings.iter().find(|s| s.name == name && s.case == case)
    }
}

static STRING_LINE_REGEX: OnceLock<Regex> = OnceLock::new();

fn string_line_regex() -> &'static Regex {
    STRING_LINE_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_]+)(?:\.([A-Za-z0-9_]+))?[ \t]*:(.*)$").unwrap()
    })
}

/// Parse the raw bytes of a language file.
///
/// Input beyond `size_limit` bytes is reported and cut at the last complete
/// line so the remainder can still be diagnosed.
pub fn parse(raw: &[u8], size_limit: usize, commands: &CommandRegistry) -> ParsedLanguage {
    let mut parser = Parser::new(commands);

    let raw = if raw.len() > size_limit {
        parser.diagnostics.push(Diagnostic::error(format!(
            "File is {} bytes, the limit is {} bytes",
            raw.len(),
            size_limit
        )));
        let head = &raw[..size_limit];
        match head.iter().rposition(|&b| b == b'\n') {
            Some(end) => &head[..=end],
            None => &head[..0],
        }
    } else {
        raw
    };

    let mut lines: Vec<&[u8]> = raw.split(|&b| b == b'\n').collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    for (i, bytes) in lines.into_iter().enumerate() {
        let number = i + 1;
        match std::str::from_utf8(bytes) {
            Ok(line) => {
                let line = line.strip_prefix('\u{feff}').unwrap_or(line);
                let line = line.strip_suffix('\r').unwrap_or(line);
                parser.line(number, line);
            }
            Err(_) => parser
                .diagnostics
                .push(Diagnostic::error("Line is not valid UTF-8").at_line(number)),
        }
    }

    parser.finish()
}

struct Parser<'a> {
    commands: &'a CommandRegistry,
    language: Option<&'static LanguageConfig>,
    grammar: Grammar,
    seen: BTreeSet<&'static str>,
    in_strings: bool,
    skeleton: Vec<SkeletonEntry>,
    strings: Vec<ParsedString>,
    defaults: BTreeSet<String>,
    keys: BTreeSet<(String, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(commands: &'a CommandRegistry) -> Self {
        Self {
            commands,
            language: None,
            grammar: Grammar::default(),
            seen: BTreeSet::new(),
            in_strings: false,
            skeleton: Vec::new(),
            strings: Vec::new(),
            defaults: BTreeSet::new(),
            keys: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, line: usize, message: String) {
        self.diagnostics.push(Diagnostic::error(message).at_line(line));
    }

    fn line(&mut self, number: usize, line: &str) {
        if line.trim().is_empty() {
            self.skeleton.push(SkeletonEntry::Literal(line.to_string()));
        } else if let Some(pragma) = line.strip_prefix("##") {
            self.pragma(number, pragma);
        } else if line.starts_with('#') || line.starts_with(';') {
            self.skeleton.push(SkeletonEntry::Literal(line.to_string()));
        } else if let Some(caps) = string_line_regex().captures(line) {
            let case = caps.get(2).map_or(DEFAULT_CASE, |m| m.as_str());
            self.string(number, &caps[1], case, &caps[3]);
        } else {
            self.error(number, "Line not recognized".to_string());
        }
    }

    fn pragma(&mut self, number: usize, pragma: &str) {
        let mut words = pragma.split_whitespace();
        let Some(keyword) = words.next() else {
            self.error(number, "Empty pragma".to_string());
            return;
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let keyword: &'static str = match keyword {
            "grflangid" => "grflangid",
            "plural" => "plural",
            "gender" => "gender",
            "case" => "case",
            other => {
                self.error(number, format!("Unknown pragma \"##{}\"", other));
                return;
            }
        };

        if self.in_strings {
            self.error(number, format!("##{} must come before the first string", keyword));
            return;
        }
        if !self.seen.insert(keyword) {
            self.error(number, format!("Duplicate ##{}", keyword));
            return;
        }

        match keyword {
            "grflangid" => {
                if args.len() != 1 {
                    self.error(number, "##grflangid takes one value".to_string());
                    return;
                }
                match LanguageRegistry::get().resolve(&args[0]) {
                    Some(config) => self.language = Some(config),
                    None => self.error(number, format!("Unknown language \"{}\"", args[0])),
                }
                self.skeleton.push(SkeletonEntry::LangId(args[0].clone()));
            }
            "plural" => {
                let value = match args.as_slice() {
                    [value] => value.parse::<u8>().ok(),
                    _ => None,
                };
                match value {
                    Some(id) if usize::from(id) < PLURAL_FORMS.len() => {
                        self.grammar.plural = Some(id);
                        self.skeleton.push(SkeletonEntry::Plural(id));
                    }
                    _ => self.error(
                        number,
                        format!("##plural expects a number from 0 to {}", PLURAL_FORMS.len() - 1),
                    ),
                }
            }
            "gender" => {
                self.grammar.genders = args.clone();
                self.skeleton.push(SkeletonEntry::Gender(args));
            }
            _ => {
                self.grammar.cases = args.clone();
                self.skeleton.push(SkeletonEntry::Case(args));
            }
        }
    }

    fn string(&mut self, number: usize, name: &str, case: &str, text: &str) {
        self.in_strings = true;

        if !self.keys.insert((name.to_string(), case.to_string())) {
            let what = if case == DEFAULT_CASE {
                format!("Duplicate string \"{}\"", name)
            } else {
                format!("Duplicate string \"{}.{}\"", name, case)
            };
            self.error(number, what);
            return;
        }

        if case == DEFAULT_CASE {
            self.defaults.insert(name.to_string());
            self.skeleton.push(SkeletonEntry::StringSlot(name.to_string()));
        } else if !self.grammar.has_case(case) {
            self.error(number, format!("Case \"{}\" is not declared", case));
        }

        let report = GrammarValidator::new(self.commands, &self.grammar)
            .validate(text, case == DEFAULT_CASE);
        self.diagnostics.extend(report.diagnostics.iter().map(|d| {
            let mut d = d.clone().at_line(number);
            d.message = format!("{}: {}", name, d.message);
            d
        }));

        self.strings.push(ParsedString {
            name: name.to_string(),
            case: case.to_string(),
            text: text.to_string(),
            line: number,
            report,
        });
    }

    fn finish(mut self) -> ParsedLanguage {
        let orphans: Vec<(usize, String, String)> = self
            .strings
            .iter()
            .filter(|s| s.case != DEFAULT_CASE && !self.defaults.contains(&s.name))
            .map(|s| (s.line, s.name.clone(), s.case.clone()))
            .collect();
        for (line, name, case) in orphans {
            self.error(
                line,
                format!("\"{}.{}\" has no default string \"{}\"", name, case, name),
            );
        }

        match self.language {
            None => self
                .diagnostics
                .push(Diagnostic::error("Missing ##grflangid pragma")),
            Some(config) => {
                if let Some(plural) = self.grammar.plural {
                    if plural != config.plural {
                        self.diagnostics.push(Diagnostic::warning(format!(
                            "##plural {} differs from the usual {} for {}",
                            plural, config.plural, config.name
                        )));
                    }
                }
            }
        }

        debug!(
            "Parsed language file: {} strings, {} diagnostics",
            self.strings.len(),
            self.diagnostics.len()
        );

        ParsedLanguage {
            language: self.language,
            grammar: self.grammar,
            skeleton: self.skeleton,
            strings: self.strings,
            diagnostics: self.diagnostics,
        }
    }
}

/// Pragma values written at the head of an exported file.
#[derive(Debug, Clone)]
pub struct FileHeader<'a> {
    pub grflangid: u8,
    pub grammar: &'a Grammar,
}

/// Write a language file following `skeleton`.
///
/// The skeleton's pragma block is replaced by `header`; each string slot
/// emits the default case followed by every declared case that `lookup`
/// has text for.
pub fn write_language_file<'t, F>(skeleton: &[SkeletonEntry], header: &FileHeader<'_>, lookup: F) -> String
where
    F: Fn(&str, &str) -> Option<&'t str>,
{
    let mut out = Vec::new();
    let mut header_written = false;

    let write_header = |out: &mut Vec<String>| {
        out.push(format!("##grflangid 0x{:02x}", header.grflangid));
        if let Some(plural) = header.grammar.plural {
            out.push(format!("##plural {}", plural));
        }
        if !header.grammar.genders.is_empty() {
            out.push(format!("##gender {}", header.grammar.genders.join(" ")));
        }
        if !header.grammar.cases.is_empty() {
            out.push(format!("##case {}", header.grammar.cases.join(" ")));
        }
    };

    for entry in skeleton {
        if entry.is_pragma() || (!header_written && matches!(entry, SkeletonEntry::StringSlot(_))) {
            if !header_written {
                write_header(&mut out);
                header_written = true;
            }
            if entry.is_pragma() {
                continue;
            }
        }

        match entry {
            SkeletonEntry::Literal(line) => out.push(line.clone()),
            SkeletonEntry::StringSlot(name) => {
                let cases = std::iter::once(DEFAULT_CASE)
                    .chain(header.grammar.cases.iter().map(String::as_str));
                for case in cases {
                    if let Some(text) = lookup(name, case) {
                        let key = if case == DEFAULT_CASE {
                            name.clone()
                        } else {
                            format!("{}.{}", name, case)
                        };
                        out.push(format!("{:<40}:{}", key, text));
                    }
                }
            }
            _ => {}
        }
    }

    if !header_written {
        write_header(&mut out);
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

/// Group parsed strings by name, default case first.
pub fn strings_by_name(parsed: &ParsedLanguage) -> BTreeMap<&str, Vec<&ParsedString>> {
    let mut grouped: BTreeMap<&str, Vec<&ParsedString>> = BTreeMap::new();
    for string in &parsed.strings {
        grouped.entry(string.name.as_str()).or_default().push(string);
    }
    for strings in grouped.values_mut() {
        strings.sort_by_key(|s| s.case != DEFAULT_CASE);
    }
    grouped
}
