//! Account records
//!
//! Models the username/password pairs that are run through the punch
//! procedure, one at a time.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConfigError;

/// A single login to run the clock in/out procedure for.
///
/// Both fields default to empty so structurally incomplete entries still load
/// and can be recorded as failed instead of aborting the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Account {
    /// Whether the entry carries enough data to attempt a login.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Sanitized identifier derived from the username: lowercased ASCII
    /// alphanumerics, everything else mapped to `_`.
    ///
    /// Used as the fallback key for per-user off-days and for diagnostic
    /// file names.
    pub fn tag(&self) -> String {
        self.username
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Load the ordered account list from a JSON file.
///
/// The file must exist and hold a non-empty array. Uniqueness is not
/// enforced; incomplete entries are kept so the runner can record them as
/// failed.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AccountsFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let accounts: Vec<Account> =
        serde_json::from_str(&content).map_err(|e| ConfigError::AccountsFile {
            path: path.display().to_string(),
            reason: format!("invalid JSON: {}", e),
        })?;

    if accounts.is_empty() {
        return Err(ConfigError::AccountsFile {
            path: path.display().to_string(),
            reason: "no accounts in file".to_string(),
        });
    }

    info!("Loaded {} accounts from {}", accounts.len(), path.display());
    Ok(accounts)
}
