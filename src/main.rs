use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use string_ledger::config::Config;
use string_ledger::i18n::{CommandRegistry, MetricsReport, UploadMetrics};
use string_ledger::langfile::{self, ParsedLanguage};
use string_ledger::{Project, StampAuthority, Status, UploadContext};

#[derive(Debug, Serialize)]
struct Overview {
    base_language: String,
    languages: BTreeMap<String, BTreeMap<Status, usize>>,
    metrics: MetricsReport,
}

fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("string_ledger=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let Some((base_path, translation_paths)) = paths.split_first() else {
        anyhow::bail!("usage: string-ledger <base-file> [translation-file ...]");
    };

    let authority = StampAuthority::new();
    let ctx = UploadContext {
        authority: &authority,
        user: Some(config.user.as_str()),
        overwrite: false,
    };

    // Step 1: Base language
    let base = read_language_file(base_path, &config)?;
    let Some(base_language) = base.isocode() else {
        log_diagnostics(base_path, &base);
        anyhow::bail!("{} does not name a known language", base_path.display());
    };
    info!("Loading base language {} from {}", base_language, base_path.display());

    let mut project = Project::new(base_language)?.with_related_limit(config.related_limit);
    let mut rejected = 0;
    if let Err(e) = project.upload(base_language, &base, &ctx) {
        log_diagnostics(base_path, &base);
        return Err(e).context("base language file rejected");
    }

    // Step 2: Translations
    for path in translation_paths {
        let parsed = read_language_file(path, &config)?;
        let Some(isocode) = parsed.isocode() else {
            log_diagnostics(path, &parsed);
            rejected += 1;
            continue;
        };
        if project.language(isocode).is_none() {
            project.add_language(isocode)?;
        }

        match project.upload(isocode, &parsed, &ctx) {
            Ok(summary) => {
                if !parsed.diagnostics.is_empty() {
                    log_diagnostics(path, &parsed);
                }
                info!("{}: {} strings skipped", path.display(), summary.skipped);
            }
            Err(e) => {
                log_diagnostics(path, &parsed);
                error!("{}: {}", path.display(), e);
                rejected += 1;
            }
        }
    }

    // Step 3: Report
    let mut languages = BTreeMap::new();
    for language in project.translations() {
        languages.insert(language.to_string(), project.overview(language)?);
    }
    let overview = Overview {
        base_language: project.base_language().to_string(),
        languages,
        metrics: UploadMetrics::global().report(),
    };
    println!("{}", serde_json::to_string_pretty(&overview)?);

    if rejected > 0 {
        anyhow::bail!("{} file(s) rejected", rejected);
    }
    Ok(())
}

/// Read and parse one language file from disk.
fn read_language_file(path: &Path, config: &Config) -> Result<ParsedLanguage> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(langfile::parse(&raw, config.upload_limit, CommandRegistry::builtin()))
}

fn log_diagnostics(path: &Path, parsed: &ParsedLanguage) {
    for diagnostic in &parsed.diagnostics {
        if diagnostic.is_error() {
            error!("{}: {}", path.display(), diagnostic);
        } else {
            warn!("{}: {}", path.display(), diagnostic);
        }
    }
}
