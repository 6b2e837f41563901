//! Projects: one base language and its translations.
//!
//! A [`Project`] owns every text and change history of its languages and is
//! the entry point for uploads, status queries, related-string lookups and
//! export. Callers serialise mutating operations per project.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{ProjectError, UploadError};
use crate::i18n::{CommandRegistry, Grammar, GrammarValidator, LanguageConfig, LanguageRegistry, UploadMetrics};
use crate::langfile::{self, FileHeader, ParsedLanguage, SkeletonEntry};
use crate::model::{Change, StringHistory, TextId, TextTable, DEFAULT_CASE};
use crate::reconcile::{self, ReconcileOutcome, UploadContext, UploadedValue};
use crate::related::RelatedIndex;
use crate::stamp::{Stamp, StampAuthority};
use crate::status::{self, CurrentBase, Status, StatusReport};

/// Number of related strings returned unless configured otherwise.
pub const DEFAULT_RELATED_LIMIT: usize = 5;

/// Change histories of one language, keyed by string name.
#[derive(Debug, Clone)]
pub struct Language {
    config: &'static LanguageConfig,

    /// Declarations of the most recent upload
    grammar: Grammar,

    strings: BTreeMap<String, StringHistory>,
}

impl Language {
    fn new(config: &'static LanguageConfig) -> Self {
        Self {
            config,
            grammar: Grammar {
                plural: Some(config.plural),
                ..Grammar::default()
            },
            strings: BTreeMap::new(),
        }
    }

    pub fn isocode(&self) -> &'static str {
        self.config.isocode
    }

    pub fn config(&self) -> &'static LanguageConfig {
        self.config
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn history(&self, name: &str) -> Option<&StringHistory> {
        self.strings.get(name)
    }

    pub fn string_names(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }
}

/// What one accepted upload did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub language: String,
    pub created: usize,
    pub reflagged: usize,
    pub restamped: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Strings dropped because the base file no longer has them
    pub removed: usize,
}

impl UploadSummary {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.created += 1,
            ReconcileOutcome::Reflagged => self.reflagged += 1,
            ReconcileOutcome::Restamped => self.restamped += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Status of every case of one string in one translation.
#[derive(Debug, Clone, Serialize)]
pub struct StringStatus {
    pub name: String,

    /// Most severe state over `cases`
    pub status: Status,

    /// Default case first, then the language's declared cases
    pub cases: Vec<StatusReport>,
}

/// A base language, its translations and everything derived from them.
#[derive(Debug)]
pub struct Project {
    base_language: String,
    languages: BTreeMap<String, Language>,
    texts: TextTable,
    skeleton: Vec<SkeletonEntry>,
    commands: CommandRegistry,
    related: OnceLock<RelatedIndex>,
    related_limit: usize,
}

impl Project {
    /// Create a project whose base language has the given ISO code.
    pub fn new(base_language: &str) -> Result<Self, ProjectError> {
        let config = resolve_language(base_language)?;
        let mut languages = BTreeMap::new();
        languages.insert(base_language.to_string(), Language::new(config));

        Ok(Self {
            base_language: base_language.to_string(),
            languages,
            texts: TextTable::new(),
            skeleton: Vec::new(),
            commands: CommandRegistry::builtin().clone(),
            related: OnceLock::new(),
            related_limit: DEFAULT_RELATED_LIMIT,
        })
    }

    /// Replace the command registry used for validation.
    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_related_limit(mut self, limit: usize) -> Self {
        self.related_limit = limit;
        self
    }

    pub fn base_language(&self) -> &str {
        &self.base_language
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn texts(&self) -> &TextTable {
        &self.texts
    }

    /// Layout of the most recent base upload.
    pub fn skeleton(&self) -> &[SkeletonEntry] {
        &self.skeleton
    }

    pub fn language(&self, name: &str) -> Option<&Language> {
        self.languages.get(name)
    }

    /// Names of all languages except the base language.
    pub fn translations(&self) -> impl Iterator<Item = &str> {
        self.languages
            .keys()
            .map(String::as_str)
            .filter(move |name| *name != self.base_language)
    }

    pub fn add_language(&mut self, name: &str) -> Result<(), ProjectError> {
        if self.languages.contains_key(name) {
            return Err(ProjectError::DuplicateLanguage(name.to_string()));
        }
        let config = resolve_language(name)?;
        self.languages.insert(name.to_string(), Language::new(config));
        info!("Added language {} ({})", name, config.name);
        Ok(())
    }

    /// Delete a translation together with its whole history.
    pub fn remove_language(&mut self, name: &str) -> Result<(), ProjectError> {
        if name == self.base_language {
            return Err(ProjectError::BaseLanguage(name.to_string()));
        }
        self.languages
            .remove(name)
            .ok_or_else(|| ProjectError::UnknownLanguage(name.to_string()))?;
        info!("Removed language {}", name);
        Ok(())
    }

    /// Merge a parsed language file into the history of `language`.
    ///
    /// A file with any error diagnostic is refused before anything changes.
    pub fn upload(
        &mut self,
        language: &str,
        parsed: &ParsedLanguage,
        ctx: &UploadContext<'_>,
    ) -> Result<UploadSummary, UploadError> {
        let metrics = UploadMetrics::global();

        if !self.languages.contains_key(language) {
            metrics.record_rejected();
            return Err(UploadError::UnknownLanguage(language.to_string()));
        }

        if parsed.has_errors() {
            let errors = parsed.errors();
            warn!(
                "Rejecting upload for {}: {} error(s), first: {}",
                language,
                errors.len(),
                errors[0]
            );
            metrics.record_rejected();
            return Err(UploadError::Invalid {
                language: language.to_string(),
                errors,
            });
        }

        if let Some(found) = parsed.isocode().filter(|found| *found != language) {
            warn!("Rejecting upload for {}: file declares {}", language, found);
            metrics.record_rejected();
            return Err(UploadError::LanguageMismatch {
                expected: language.to_string(),
                found: found.to_string(),
            });
        }

        let summary = if language == self.base_language {
            self.upload_base(parsed, ctx)
        } else {
            match self.upload_translation(language, parsed, ctx) {
                Ok(summary) => summary,
                Err(e) => {
                    metrics.record_rejected();
                    return Err(e);
                }
            }
        };

        metrics.record_created(summary.created);
        metrics.record_reflagged(summary.reflagged);
        metrics.record_restamped(summary.restamped);
        metrics.record_skipped(summary.skipped);

        info!(
            "Uploaded {}: {} created, {} reflagged, {} restamped, {} unchanged, {} skipped, {} removed",
            language,
            summary.created,
            summary.reflagged,
            summary.restamped,
            summary.unchanged,
            summary.skipped,
            summary.removed
        );
        Ok(summary)
    }

    fn upload_base(&mut self, parsed: &ParsedLanguage, ctx: &UploadContext<'_>) -> UploadSummary {
        let mut summary = UploadSummary::new(&self.base_language);

        if let Some(base) = self.languages.get_mut(&self.base_language) {
            for (name, strings) in langfile::strings_by_name(parsed) {
                let history = base.strings.entry(name.to_string()).or_default();
                for string in strings {
                    let value = UploadedValue {
                        name,
                        case: &string.case,
                        text: &string.text,
                    };
                    summary.record(reconcile::reconcile_base(history, &mut self.texts, ctx, value));
                }
            }
            base.grammar = parsed.grammar.clone();
        }

        let kept: BTreeSet<&str> = parsed.strings.iter().map(|s| s.name.as_str()).collect();
        for (name, language) in self.languages.iter_mut() {
            let before = language.strings.len();
            language.strings.retain(|string, _| kept.contains(string.as_str()));
            if *name == self.base_language {
                summary.removed = before - language.strings.len();
            }
        }

        self.skeleton = parsed.skeleton.clone();
        self.related = OnceLock::new();
        summary
    }

    fn upload_translation(
        &mut self,
        language: &str,
        parsed: &ParsedLanguage,
        ctx: &UploadContext<'_>,
    ) -> Result<UploadSummary, UploadError> {
        let current = self.current_base_texts();
        if current.is_empty() {
            return Err(UploadError::NoBase(language.to_string()));
        }

        let target = self
            .languages
            .get_mut(language)
            .ok_or_else(|| UploadError::UnknownLanguage(language.to_string()))?;

        let mut summary = UploadSummary::new(language);
        for string in &parsed.strings {
            let Some(&base) = current.get(string.name.as_str()) else {
                debug!("Skipping {}: not in the base language", string.name);
                summary.record(ReconcileOutcome::Skipped);
                continue;
            };

            let history = target.strings.entry(string.name.clone()).or_default();
            let value = UploadedValue {
                name: &string.name,
                case: &string.case,
                text: &string.text,
            };
            let outcome = reconcile::reconcile_translation(history, &mut self.texts, ctx, Some(base), value);
            summary.record(outcome);
        }
        target.grammar = parsed.grammar.clone();

        Ok(summary)
    }

    /// Newest default-case base text of every string.
    fn current_base_texts(&self) -> BTreeMap<String, TextId> {
        self.languages
            .get(&self.base_language)
            .map(|base| {
                base.strings
                    .iter()
                    .filter_map(|(name, history)| {
                        history
                            .newest_base(DEFAULT_CASE)
                            .map(|change| (name.clone(), change.base_text()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn current_base(&self, name: &str) -> Option<CurrentBase> {
        let base = self.languages.get(&self.base_language)?;
        let change = base.strings.get(name)?.newest_base(DEFAULT_CASE)?;
        let report = GrammarValidator::new(&self.commands, &base.grammar)
            .validate(self.texts[change.base_text()].content(), true);

        Some(CurrentBase {
            text: change.base_text(),
            stamp: change.stamp(),
            report,
        })
    }

    fn translation(&self, language: &str) -> Result<&Language, ProjectError> {
        if language == self.base_language {
            return Err(ProjectError::BaseLanguage(language.to_string()));
        }
        self.languages
            .get(language)
            .ok_or_else(|| ProjectError::UnknownLanguage(language.to_string()))
    }

    /// Classify the default case and every declared case of `name`.
    pub fn classify_string(&self, language: &str, name: &str) -> Result<StringStatus, ProjectError> {
        let target = self.translation(language)?;
        let in_base = self
            .languages
            .get(&self.base_language)
            .is_some_and(|base| base.strings.contains_key(name));
        if !in_base {
            return Err(ProjectError::UnknownString(name.to_string()));
        }

        let current = self.current_base(name);
        let empty = StringHistory::new();
        let history = target.strings.get(name).unwrap_or(&empty);
        let validator = GrammarValidator::new(&self.commands, &target.grammar);

        let cases: Vec<StatusReport> = std::iter::once(DEFAULT_CASE)
            .chain(target.grammar.cases.iter().map(String::as_str))
            .map(|case| status::classify(history, case, current.as_ref(), &self.texts, &validator))
            .collect();

        Ok(StringStatus {
            name: name.to_string(),
            status: Status::worst(cases.iter().map(|r| r.status)).unwrap_or(Status::Missing),
            cases,
        })
    }

    /// Number of base strings in each state for a translation.
    pub fn overview(&self, language: &str) -> Result<BTreeMap<Status, usize>, ProjectError> {
        self.translation(language)?;

        let mut counts: BTreeMap<Status, usize> = Status::ALL.iter().map(|s| (*s, 0)).collect();
        if let Some(base) = self.languages.get(&self.base_language) {
            for name in base.strings.keys() {
                let status = self.classify_string(language, name)?;
                *counts.entry(status.status).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Confirm that the newest translation of `name` still fits the current
    /// base text.
    ///
    /// This is the one operation that rewrites an existing change: it is
    /// bound to the current base text under a fresh stamp and `user`.
    pub fn accept_translation(
        &mut self,
        language: &str,
        name: &str,
        case: &str,
        authority: &StampAuthority,
        user: Option<&str>,
    ) -> Result<Stamp, ProjectError> {
        self.translation(language)?;

        let base = self
            .languages
            .get(&self.base_language)
            .and_then(|base| base.strings.get(name))
            .and_then(|history| history.newest_base(DEFAULT_CASE))
            .map(Change::base_text)
            .ok_or_else(|| ProjectError::UnknownString(name.to_string()))?;

        let nothing = || ProjectError::NothingToAccept {
            name: name.to_string(),
            case: case.to_string(),
        };
        let history = self
            .languages
            .get_mut(language)
            .and_then(|target| target.strings.get_mut(name))
            .ok_or_else(nothing)?;
        let position = history.newest_translation_position(case).ok_or_else(nothing)?;

        let stamp = authority.now();
        history.accept_as_current(position, base, stamp, user);
        info!("Accepted {} translation of {} ({}) at {}", language, name, case, stamp);
        Ok(stamp)
    }

    /// Base strings most similar to `name`, best first.
    pub fn related(&self, name: &str) -> Vec<String> {
        let index = self.related.get_or_init(|| {
            let strings: Vec<(&str, &str)> = self
                .languages
                .get(&self.base_language)
                .map(|base| {
                    base.strings
                        .iter()
                        .filter_map(|(name, history)| {
                            let change = history.newest_base(DEFAULT_CASE)?;
                            Some((name.as_str(), self.texts[change.base_text()].content()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            RelatedIndex::build(strings)
        });
        index.query(name, self.related_limit)
    }

    /// Render `language` as a language file laid out like the base file.
    ///
    /// Translations are only written when they are up to date or out of
    /// date; invalid and missing ones are left out.
    pub fn export(&self, language: &str) -> Result<String, ProjectError> {
        let target = self
            .languages
            .get(language)
            .ok_or_else(|| ProjectError::UnknownLanguage(language.to_string()))?;

        let mut values: BTreeMap<String, BTreeMap<String, &str>> = BTreeMap::new();
        for (name, history) in &target.strings {
            let cases = values.entry(name.clone()).or_default();
            if language == self.base_language {
                for case in history.cases() {
                    if let Some(change) = history.newest_base(case) {
                        cases.insert(case.to_string(), self.texts[change.base_text()].content());
                    }
                }
                continue;
            }

            let Ok(status) = self.classify_string(language, name) else {
                continue;
            };
            for report in status.cases {
                if !matches!(report.status, Status::UpToDate | Status::OutOfDate) {
                    continue;
                }
                if let Some(change) = history.newest_translation(&report.case) {
                    cases.insert(report.case, self.texts[change.text()].content());
                }
            }
            // Case variants cannot stand without their default string
            if !cases.contains_key(DEFAULT_CASE) {
                cases.clear();
            }
        }

        let header = FileHeader {
            grflangid: target.config.grflangid,
            grammar: &target.grammar,
        };
        Ok(langfile::write_language_file(&self.skeleton, &header, |name, case| {
            values.get(name).and_then(|cases| cases.get(case)).copied()
        }))
    }
}

fn resolve_language(isocode: &str) -> Result<&'static LanguageConfig, ProjectError> {
    LanguageRegistry::get()
        .get_by_isocode(isocode)
        .ok_or_else(|| ProjectError::UnsupportedLanguage(isocode.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000;

    fn parse(text: &str) -> ParsedLanguage {
        langfile::parse(text.as_bytes(), 1 << 20, CommandRegistry::builtin())
    }

    fn ctx(authority: &StampAuthority, overwrite: bool) -> UploadContext<'_> {
        UploadContext {
            authority,
            user: Some("tester"),
            overwrite,
        }
    }

    fn project() -> Project {
        let mut project = Project::new("en_GB").unwrap();
        project.add_language("fr_FR").unwrap();
        project
    }

    fn status(project: &Project, name: &str) -> Status {
        project.classify_string("fr_FR", name).unwrap().status
    }

    const BASE: &str = "##grflangid 0x01
##plural 0
; Errors
ERR_TOO_FAST      :{RED}Too fast{P car cars}
STR_CARS          :{NUM} car{P \"\" s}
STR_DEPOT         :Train depot
";

    // ==================== Language Management Tests ====================

    #[test]
    fn test_new_project_unknown_language() {
        assert_eq!(
            Project::new("xx_XX").unwrap_err(),
            ProjectError::UnsupportedLanguage("xx_XX".to_string())
        );
    }

    #[test]
    fn test_add_and_remove_language() {
        let mut project = project();
        assert_eq!(
            project.add_language("fr_FR").unwrap_err(),
            ProjectError::DuplicateLanguage("fr_FR".to_string())
        );
        assert_eq!(project.translations().collect::<Vec<_>>(), vec!["fr_FR"]);
        let french = project.language("fr_FR").unwrap();
        assert_eq!(french.config().grflangid, 0x03);
        assert_eq!(french.isocode(), "fr_FR");
        assert_eq!(french.grammar().plural, Some(2));
        assert_eq!(project.base_language(), "en_GB");

        project.remove_language("fr_FR").unwrap();
        assert!(project.language("fr_FR").is_none());
        assert!(project.remove_language("fr_FR").is_err());
    }

    #[test]
    fn test_base_language_cannot_be_removed() {
        let mut project = project();
        assert_eq!(
            project.remove_language("en_GB").unwrap_err(),
            ProjectError::BaseLanguage("en_GB".to_string())
        );
    }

    #[test]
    fn test_custom_command_registry() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project().with_commands(CommandRegistry::default());
        assert!(project.commands().is_empty());

        // Without any known command the base text itself is the only check
        project
            .upload("en_GB", &parse("##grflangid 0x01\nSTR_A :Plain text\n"), &ctx(&authority, false))
            .unwrap();
        project
            .upload("fr_FR", &parse("##grflangid fr_FR\nSTR_A :Texte\n"), &ctx(&authority, false))
            .unwrap();
        assert_eq!(status(&project, "STR_A"), Status::UpToDate);
        assert_eq!(project.texts().len(), 2);
    }

    // ==================== Upload Tests ====================

    #[test]
    fn test_base_upload_creates_and_reupload_is_unchanged() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();

        let first = project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        assert_eq!(first.created, 3);

        let second = project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 3);
        assert_eq!(project.skeleton().len(), 6);
    }

    #[test]
    fn test_invalid_file_rejected_wholesale() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();

        let translation = parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\nSTR_CARS :{BOGUS}\n");
        let err = project
            .upload("fr_FR", &translation, &ctx(&authority, false))
            .unwrap_err();

        match err {
            UploadError::Invalid { language, errors } => {
                assert_eq!(language, "fr_FR");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(project.language("fr_FR").unwrap().string_names().count(), 0);
    }

    #[test]
    fn test_translation_before_base_is_refused() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        let err = project
            .upload("fr_FR", &parse("##grflangid fr_FR\nSTR_DEPOT :Dépôt\n"), &ctx(&authority, false))
            .unwrap_err();
        assert!(matches!(err, UploadError::NoBase(_)));
    }

    #[test]
    fn test_upload_language_mismatch() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        let err = project
            .upload("fr_FR", &parse("##grflangid de_DE\nSTR_DEPOT :Depot\n"), &ctx(&authority, false))
            .unwrap_err();
        assert!(matches!(err, UploadError::LanguageMismatch { .. }));
    }

    #[test]
    fn test_upload_unknown_language() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        let err = project
            .upload("de_DE", &parse("##grflangid de_DE\n"), &ctx(&authority, false))
            .unwrap_err();
        assert!(matches!(err, UploadError::UnknownLanguage(_)));
    }

    #[test]
    fn test_translation_of_unknown_string_is_skipped() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();

        let summary = project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\nSTR_GONE :Parti\n"),
                &ctx(&authority, false),
            )
            .unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert!(project.language("fr_FR").unwrap().history("STR_GONE").is_none());
    }

    #[test]
    fn test_base_upload_drops_removed_strings_everywhere() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        project
            .upload("fr_FR", &parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\n"), &ctx(&authority, false))
            .unwrap();

        let summary = project
            .upload("en_GB", &parse("##grflangid en_GB\nERR_TOO_FAST :{RED}Too fast\n"), &ctx(&authority, false))
            .unwrap();
        assert_eq!(summary.removed, 2);
        assert!(project.language("fr_FR").unwrap().history("STR_DEPOT").is_none());
        assert!(project.classify_string("fr_FR", "STR_DEPOT").is_err());
    }

    // ==================== Status Tests ====================

    #[test]
    fn test_plural_redeclaration_makes_translation_out_of_date() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();

        project
            .upload(
                "en_GB",
                &parse("##grflangid en_GB\n##plural 0\nERR_TOO_FAST :{RED}Too fast{P car cars}\n"),
                &ctx(&authority, false),
            )
            .unwrap();
        project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##plural 2\nERR_TOO_FAST :{RED}Trop rapide{P voiture voitures}\n"),
                &ctx(&authority, false),
            )
            .unwrap();
        assert_eq!(status(&project, "ERR_TOO_FAST"), Status::UpToDate);

        let summary = project
            .upload(
                "en_GB",
                &parse("##grflangid en_GB\n##plural 2\nERR_TOO_FAST :{RED}Too fast{P car cars}\n"),
                &ctx(&authority, true),
            )
            .unwrap();
        assert_eq!(summary.restamped, 1);
        assert_eq!(status(&project, "ERR_TOO_FAST"), Status::OutOfDate);

        project
            .accept_translation("fr_FR", "ERR_TOO_FAST", DEFAULT_CASE, &authority, Some("reviewer"))
            .unwrap();
        assert_eq!(status(&project, "ERR_TOO_FAST"), Status::UpToDate);
        let history = project.language("fr_FR").unwrap().history("ERR_TOO_FAST").unwrap();
        assert_eq!(history.newest_translation("").unwrap().user(), Some("reviewer"));
    }

    #[test]
    fn test_changed_base_text_makes_translation_out_of_date() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        project
            .upload("fr_FR", &parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\n"), &ctx(&authority, false))
            .unwrap();
        assert_eq!(status(&project, "STR_DEPOT"), Status::UpToDate);

        let changed = BASE.replace("Train depot", "Train depot (rail)");
        project.upload("en_GB", &parse(&changed), &ctx(&authority, false)).unwrap();
        assert_eq!(status(&project, "STR_DEPOT"), Status::OutOfDate);
    }

    #[test]
    fn test_overview_counts_each_state() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\nSTR_CARS :voitures\n"),
                &ctx(&authority, false),
            )
            .unwrap();

        let overview = project.overview("fr_FR").unwrap();
        assert_eq!(overview[&Status::UpToDate], 1);
        assert_eq!(overview[&Status::Invalid], 1);
        assert_eq!(overview[&Status::Missing], 1);
        assert_eq!(overview[&Status::OutOfDate], 0);
        assert_eq!(overview.len(), Status::ALL.len());
    }

    #[test]
    fn test_declared_cases_are_classified() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##plural 2\n##case gen\nSTR_DEPOT :Dépôt\n"),
                &ctx(&authority, false),
            )
            .unwrap();

        let string = project.classify_string("fr_FR", "STR_DEPOT").unwrap();
        let cases: Vec<_> = string.cases.iter().map(|r| (r.case.as_str(), r.status)).collect();
        assert_eq!(cases, vec![("", Status::UpToDate), ("gen", Status::MissingOk)]);
        assert_eq!(string.status, Status::UpToDate);
        assert_eq!(project.language("fr_FR").unwrap().grammar().cases, vec!["gen"]);
    }

    #[test]
    fn test_classify_rejects_base_language_and_unknown_string() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();

        assert!(matches!(
            project.classify_string("en_GB", "STR_DEPOT"),
            Err(ProjectError::BaseLanguage(_))
        ));
        assert!(matches!(
            project.classify_string("fr_FR", "STR_NOPE"),
            Err(ProjectError::UnknownString(_))
        ));
    }

    #[test]
    fn test_accept_without_translation() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();

        let err = project
            .accept_translation("fr_FR", "STR_DEPOT", "", &authority, None)
            .unwrap_err();
        assert!(matches!(err, ProjectError::NothingToAccept { .. }));
    }

    // ==================== Related Tests ====================

    #[test]
    fn test_related_follows_base_changes() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        let base = "##grflangid en_GB\nSTR_TRAIN :Train depot\nSTR_TRAINS :Trains in a depot\nSTR_SHIP :Ship\n";
        project.upload("en_GB", &parse(base), &ctx(&authority, false)).unwrap();
        assert_eq!(project.related("STR_TRAIN"), vec!["STR_TRAINS"]);

        let base = base.replace(":Ship", ":Ship depot");
        project.upload("en_GB", &parse(&base), &ctx(&authority, false)).unwrap();
        assert_eq!(project.related("STR_TRAIN"), vec!["STR_TRAINS", "STR_SHIP"]);
    }

    #[test]
    fn test_related_limit() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project().with_related_limit(1);
        let base = "##grflangid en_GB\nSTR_A :Depot\nSTR_B :Depot\nSTR_C :Depot\n";
        project.upload("en_GB", &parse(base), &ctx(&authority, false)).unwrap();
        assert_eq!(project.related("STR_C"), vec!["STR_A"]);
    }

    // ==================== Export Tests ====================

    #[test]
    fn test_export_translation_keeps_usable_strings_only() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project.upload("en_GB", &parse(BASE), &ctx(&authority, false)).unwrap();
        project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##plural 2\nSTR_DEPOT :Dépôt\nSTR_CARS :voitures\n"),
                &ctx(&authority, false),
            )
            .unwrap();

        let out = project.export("fr_FR").unwrap();
        assert!(out.starts_with("##grflangid 0x03\n##plural 2\n"));
        assert!(out.contains("; Errors"));
        assert!(out.contains(":Dépôt"));
        assert!(!out.contains("voitures"));
        assert!(!out.contains("ERR_TOO_FAST"));
    }

    #[test]
    fn test_export_drops_cases_of_unusable_default() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        project
            .upload("en_GB", &parse("##grflangid 0x01\nSTR_A :{NUM} trains\n"), &ctx(&authority, false))
            .unwrap();
        project
            .upload(
                "fr_FR",
                &parse("##grflangid fr_FR\n##case gen\nSTR_A :trains\nSTR_A.gen :{NUM} trains\n"),
                &ctx(&authority, false),
            )
            .unwrap();

        let string = project.classify_string("fr_FR", "STR_A").unwrap();
        assert_eq!(string.cases[0].status, Status::Invalid);
        assert_eq!(string.cases[1].status, Status::UpToDate);

        let out = project.export("fr_FR").unwrap();
        assert!(!out.contains("STR_A"));
        let reparsed = parse(&out);
        assert!(!reparsed.has_errors(), "{:?}", reparsed.diagnostics);
    }

    #[test]
    fn test_export_base_reparses_identically() {
        let authority = StampAuthority::with_clock(|| T);
        let mut project = project();
        let original = parse(BASE);
        project.upload("en_GB", &original, &ctx(&authority, false)).unwrap();

        let reparsed = parse(&project.export("en_GB").unwrap());
        assert!(!reparsed.has_errors());
        assert_eq!(reparsed.skeleton, original.skeleton);
        for string in &original.strings {
            assert_eq!(reparsed.get(&string.name, &string.case).unwrap().text, string.text);
        }
    }
}
