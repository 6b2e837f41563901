use anyhow::{bail, Result};

use crate::project::DEFAULT_RELATED_LIMIT;

/// Largest language file accepted unless configured otherwise.
pub const DEFAULT_UPLOAD_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct Config {
    // Uploads
    pub upload_limit: usize,
    pub user: String,

    // Related strings
    pub related_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            // Uploads - raw bytes, larger files are diagnosed and rejected
            upload_limit: std::env::var("STRING_LEDGER_UPLOAD_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_UPLOAD_LIMIT),
            user: std::env::var("STRING_LEDGER_USER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "upload".to_string()),

            // Related strings
            related_limit: std::env::var("STRING_LEDGER_RELATED_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RELATED_LIMIT),
        };

        if config.upload_limit == 0 {
            bail!("STRING_LEDGER_UPLOAD_LIMIT must be greater than zero");
        }

        Ok(config)
    }
}
