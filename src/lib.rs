//! Translation history and consistency checks for game-string language files.
//!
//! A [`Project`] holds a base language and its translations. Uploaded files
//! are parsed by [`langfile::parse`], reconciled with each string's change
//! history, and classified against the current base text on demand.

pub mod config;
pub mod error;
pub mod i18n;
pub mod langfile;
pub mod model;
pub mod project;
pub mod reconcile;
pub mod related;
pub mod stamp;
pub mod status;

pub use error::{ProjectError, StampError, UploadError};
pub use project::{Language, Project, StringStatus, UploadSummary};
pub use reconcile::{ReconcileOutcome, UploadContext};
pub use stamp::{Stamp, StampAuthority};
pub use status::{Status, StatusReport};
