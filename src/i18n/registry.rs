//! Language registry: the languages a `##grflangid` line may name.
//!
//! This module provides a centralized table of known languages together with
//! the plural form definitions they refer to. It uses a singleton pattern with
//! `OnceLock` to ensure thread-safe initialization and access.

use std::sync::OnceLock;

/// One plural form rule.
#[derive(Debug, Clone, Copy)]
pub struct PluralForm {
    /// Number of forms a `{P ..}` selection must list
    pub count: usize,

    /// Human readable description of when each form is used
    pub description: &'static str,
}

/// Plural form rules, indexed by the `##plural` id.
pub const PLURAL_FORMS: [PluralForm; 13] = [
    PluralForm { count: 2, description: "Two forms: special case for 1" },
    PluralForm { count: 1, description: "Only one form" },
    PluralForm { count: 2, description: "Two forms: singular used for 0 and 1" },
    PluralForm { count: 3, description: "Three forms: special cases for 0, and numbers ending in 1 except 11" },
    PluralForm { count: 5, description: "Five forms: special cases for 1, 2, 3 to 6, and 7 to 10" },
    PluralForm { count: 3, description: "Three forms: special cases for numbers ending in 1 except 11, and 2 to 9 except 12 to 19" },
    PluralForm { count: 3, description: "Three forms: special cases for numbers ending in 1 except 11, and 2 to 4 except 12 to 14" },
    PluralForm { count: 3, description: "Three forms: special cases for 1, and numbers ending in 2 to 4 except 12 to 14" },
    PluralForm { count: 4, description: "Four forms: special cases for numbers ending in 01, 02, and 03 to 04" },
    PluralForm { count: 2, description: "Two forms: special case for numbers ending in 1 except 11" },
    PluralForm { count: 3, description: "Three forms: special cases for 1, and 2 to 4" },
    PluralForm { count: 2, description: "Two forms: cases for numbers ending with a consonant and with a vowel" },
    PluralForm { count: 4, description: "Four forms: special cases for 1, 0 and numbers ending in 02 to 10, and 11 to 19" },
];

/// A language a file may declare itself as.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO code with region (e.g., "en_GB", "fr_FR")
    pub isocode: &'static str,

    /// Numeric language id used by `##grflangid`
    pub grflangid: u8,

    /// English name of the language (e.g., "English (UK)", "French")
    pub name: &'static str,

    /// Plural form id the language normally uses
    pub plural: u8,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its ISO code.
    pub fn get_by_isocode(&self, isocode: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.isocode == isocode)
    }

    /// Get a language configuration by its numeric id.
    pub fn get_by_grflangid(&self, grflangid: u8) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.grflangid == grflangid)
    }

    /// Resolve the value of a `##grflangid` line.
    ///
    /// Accepts an ISO code (`fr_FR`) or a hexadecimal id with or without
    /// `0x` prefix (`0x03`, `03`).
    pub fn resolve(&self, value: &str) -> Option<&LanguageConfig> {
        let value = value.trim();
        if let Some(config) = self.get_by_isocode(value) {
            return Some(config);
        }

        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        u8::from_str_radix(hex, 16)
            .ok()
            .and_then(|id| self.get_by_grflangid(id))
    }

    /// Get all languages.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    let table: [(&'static str, u8, &'static str, u8); 20] = [
        ("en_US", 0x00, "English (US)", 0),
        ("en_GB", 0x01, "English (UK)", 0),
        ("de_DE", 0x02, "German", 0),
        ("fr_FR", 0x03, "French", 2),
        ("es_ES", 0x04, "Spanish", 0),
        ("eo_EO", 0x05, "Esperanto", 0),
        ("ru_RU", 0x07, "Russian", 6),
        ("zh_TW", 0x0C, "Chinese (Traditional)", 1),
        ("cs_CZ", 0x15, "Czech", 10),
        ("sk_SK", 0x16, "Slovak", 10),
        ("nl_NL", 0x1F, "Dutch", 0),
        ("it_IT", 0x27, "Italian", 0),
        ("lt_LT", 0x2B, "Lithuanian", 5),
        ("sv_SE", 0x2E, "Swedish", 0),
        ("pl_PL", 0x30, "Polish", 7),
        ("fi_FI", 0x35, "Finnish", 0),
        ("pt_BR", 0x37, "Portuguese (Brazilian)", 2),
        ("ja_JP", 0x39, "Japanese", 1),
        ("ko_KR", 0x3A, "Korean", 11),
        ("zh_CN", 0x56, "Chinese (Simplified)", 1),
    ];

    table
        .into_iter()
        .map(|(isocode, grflangid, name, plural)| LanguageConfig {
            isocode,
            grflangid,
            name,
            plural,
        })
        .collect()
}
