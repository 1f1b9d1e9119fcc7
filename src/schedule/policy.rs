//! Off-day scheduling policy
//!
//! Decides, per account, whether today is a working day. The calendar day is
//! taken from the configured time zone so a run that crosses midnight still
//! classifies the day the way the target audience sees it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::delay::DelayRange;
use crate::accounts::Account;
use crate::config::ConfigError;

/// Skip rules and jitter delays for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffDayConfig {
    /// IANA zone name (e.g. "Asia/Riyadh"). Blank or invalid falls back to
    /// the host's local zone.
    pub time_zone: String,
    pub skip_weekends: bool,
    pub global_off_dates: HashSet<NaiveDate>,
    pub per_user_off_dates: HashMap<String, HashSet<NaiveDate>>,
    pub start_delay: DelayRange,
    pub between_accounts_delay: DelayRange,
}

impl OffDayConfig {
    /// Load from a JSON file. A missing file yields the defaults (no skip
    /// rules, no delays); an unreadable or malformed file is a
    /// configuration error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No off-day file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::OffDaysFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::OffDaysFile {
                path: path.display().to_string(),
                reason: format!("invalid JSON: {}", e),
            })?;

        info!(
            "Loaded off-day rules from {} (skip weekends: {}, {} global dates)",
            path.display(),
            config.skip_weekends,
            config.global_off_dates.len()
        );
        Ok(config.sanitized())
    }

    /// Clamp delay bounds to be non-negative.
    fn sanitized(mut self) -> Self {
        self.start_delay = self.start_delay.clamped();
        self.between_accounts_delay = self.between_accounts_delay.clamped();
        self
    }
}

/// Why an account was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Weekend,
    GlobalOff,
    UserOff,
}

/// Today's calendar date in the given zone.
///
/// Takes the instant as a parameter; callers compute it once per run so every
/// account in a batch shares the same "today" even if wall-clock time crosses
/// midnight mid-run.
pub fn local_date_in(zone: &str, now: DateTime<Utc>) -> NaiveDate {
    let raw = zone.trim();
    if raw.is_empty() {
        return now.with_timezone(&Local).date_naive();
    }
    match raw.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).date_naive(),
        Err(_) => {
            warn!("Unknown time zone {:?}, using the host's local zone", raw);
            now.with_timezone(&Local).date_naive()
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Evaluate the skip rules for one account. First match wins: weekend, then
/// global off-date, then the account's own off-dates (keyed by the raw
/// username, falling back to the sanitized tag when the raw key is absent).
pub fn should_skip(
    account: &Account,
    today: NaiveDate,
    config: &OffDayConfig,
) -> Option<SkipReason> {
    if config.skip_weekends && is_weekend(today) {
        return Some(SkipReason::Weekend);
    }

    if config.global_off_dates.contains(&today) {
        return Some(SkipReason::GlobalOff);
    }

    let user_dates = config
        .per_user_off_dates
        .get(&account.username)
        .or_else(|| config.per_user_off_dates.get(&account.tag()));
    if user_dates.is_some_and(|dates| dates.contains(&today)) {
        return Some(SkipReason::UserOff);
    }

    None
}
