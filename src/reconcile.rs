//! Change reconciliation for uploaded language files.
//!
//! Each uploaded string value is matched against the existing history of
//! its string so that re-uploading known text reuses the change that holds
//! it instead of growing the history. Whatever happens, at most one change
//! per case carries the last-upload flag afterwards.

use serde::Serialize;

use crate::model::{Change, StringHistory, TextId, TextTable};
use crate::stamp::StampAuthority;

/// Settings shared by every string of one upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadContext<'a> {
    pub authority: &'a StampAuthority,

    /// User recorded on created or restamped changes
    pub user: Option<&'a str>,

    /// Treat uploaded text as correct for the current base text even when
    /// a matching change already exists
    pub overwrite: bool,
}

/// What reconciling one value did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileOutcome {
    /// A new change was appended
    Created,
    /// An existing change became the last upload
    Reflagged,
    /// An existing change was given a new stamp and user
    Restamped,
    /// The matching change already was the last upload
    Unchanged,
    /// The value could not be placed
    Skipped,
}

/// A single uploaded value.
#[derive(Debug, Clone, Copy)]
pub struct UploadedValue<'a> {
    pub name: &'a str,
    pub case: &'a str,
    pub text: &'a str,
}

/// Reconcile a base-language value with the string's history.
///
/// A change whose text equals the value is reused when it is the newest of
/// its case; with `overwrite` any matching change is restamped to become
/// the newest. Otherwise a new change is created.
pub fn reconcile_base(
    history: &mut StringHistory,
    texts: &mut TextTable,
    ctx: &UploadContext<'_>,
    value: UploadedValue<'_>,
) -> ReconcileOutcome {
    let newest = history.newest_base(value.case).map(Change::stamp);
    let found = history
        .changes()
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.case() == value.case
                && !c.is_translation()
                && texts[c.base_text()].content() == value.text
        })
        .max_by_key(|(_, c)| c.stamp())
        .map(|(i, c)| (i, Some(c.stamp()) == newest, c.last_upload()));

    match found {
        Some((position, _, _)) if ctx.overwrite => {
            let text = history.changes()[position].base_text();
            let at = history.accept_as_current(position, text, ctx.authority.now(), ctx.user);
            history.flag_last_upload(at);
            ReconcileOutcome::Restamped
        }
        Some((_, true, true)) => ReconcileOutcome::Unchanged,
        Some((position, true, false)) => {
            history.flag_last_upload(position);
            ReconcileOutcome::Reflagged
        }
        _ => {
            let stamp = ctx.authority.now();
            let text = texts.intern(value.text, value.case, stamp);
            let at = history.push(Change::base(value.name, value.case, text, stamp, ctx.user));
            history.flag_last_upload(at);
            ReconcileOutcome::Created
        }
    }
}

/// Reconcile a translated value with the string's history.
///
/// `current_base` is the newest default-case base text of the string; the
/// value is skipped without it. Matching changes are ranked: made against
/// the current base beats a stale base, and being the last upload beats
/// not being it. Ties go to the newest change.
pub fn reconcile_translation(
    history: &mut StringHistory,
    texts: &mut TextTable,
    ctx: &UploadContext<'_>,
    current_base: Option<TextId>,
    value: UploadedValue<'_>,
) -> ReconcileOutcome {
    let Some(base) = current_base else {
        return ReconcileOutcome::Skipped;
    };

    let priority = |c: &Change| {
        let stale = if c.base_text() == base { 0 } else { 2 };
        let replaced = if c.last_upload() { 0 } else { 1 };
        stale + replaced
    };

    let best = history
        .changes()
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.case() == value.case
                && c.new_text().is_some_and(|t| texts[t].content() == value.text)
        })
        .min_by(|(_, a), (_, b)| {
            priority(a)
                .cmp(&priority(b))
                .then_with(|| b.stamp().cmp(&a.stamp()))
        })
        .map(|(i, c)| (i, c.last_upload()));

    match best {
        Some((position, _)) if ctx.overwrite => {
            let at = history.accept_as_current(position, base, ctx.authority.now(), ctx.user);
            history.flag_last_upload(at);
            ReconcileOutcome::Restamped
        }
        Some((_, true)) => ReconcileOutcome::Unchanged,
        Some((position, false)) => {
            history.flag_last_upload(position);
            ReconcileOutcome::Reflagged
        }
        None => {
            let stamp = ctx.authority.now();
            let text = texts.intern(value.text, value.case, stamp);
            let change = Change::translation(value.name, value.case, base, text, stamp, ctx.user);
            let at = history.push(change);
            history.flag_last_upload(at);
            ReconcileOutcome::Created
        }
    }
}
