//! Run configuration
//!
//! Everything is injected through environment-style key/value pairs and read
//! once at startup; the resulting [`RunConfig`] is passed down explicitly.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Configuration errors. Fatal: the run aborts before any browser session
/// starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    MissingValue(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Accounts file {path}: {reason}")]
    AccountsFile { path: String, reason: String },

    #[error("Off-days file {path}: {reason}")]
    OffDaysFile { path: String, reason: String },
}

/// Which action control to click after reaching the target page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    In,
    Out,
}

impl Mode {
    /// `OUT` selects clock-out; anything else (including unset) is clock-in.
    fn from_raw(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::trim) {
            Some("OUT") => Mode::Out,
            _ => Mode::In,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::In => "IN",
            Mode::Out => "OUT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All knobs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub login_url: String,
    pub target_url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    /// The action-control selector chosen by `mode`.
    pub button_selector: String,
    pub accounts_file: PathBuf,
    pub off_days_file: PathBuf,
    pub limit: Option<usize>,
    pub results_file: PathBuf,
    pub shots_dir: PathBuf,
    pub headless: bool,
    pub chrome_path: Option<String>,
}

impl RunConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary lookup function.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = Mode::from_raw(get("MODE"));

        let login_url = required(&get, "LOGIN_URL")?;
        let target_url = required(&get, "TARGET_URL")?;
        validate_url("LOGIN_URL", &login_url)?;
        validate_url("TARGET_URL", &target_url)?;

        let username_selector = required(&get, "USERNAME_SELECTOR")?;
        let password_selector = required(&get, "PASSWORD_SELECTOR")?;
        let submit_selector = required(&get, "SUBMIT_SELECTOR")?;

        let button_key = match mode {
            Mode::In => "BUTTON_IN_SELECTOR",
            Mode::Out => "BUTTON_OUT_SELECTOR",
        };
        let button_selector = required(&get, button_key)?;

        let limit = match get("LIMIT") {
            Some(raw) if !raw.trim().is_empty() => {
                let parsed = raw.trim().parse::<usize>().map_err(|e| {
                    ConfigError::InvalidValue {
                        name: "LIMIT",
                        reason: e.to_string(),
                    }
                })?;
                Some(parsed)
            }
            _ => None,
        };

        let headless = match get("HEADLESS").as_deref().map(str::trim) {
            Some("false") | Some("0") | Some("no") => false,
            _ => true,
        };

        Ok(Self {
            mode,
            login_url,
            target_url,
            username_selector,
            password_selector,
            submit_selector,
            button_selector,
            accounts_file: path_or(&get, "ACCOUNTS_FILE", "accounts.json"),
            off_days_file: path_or(&get, "OFF_DAYS_FILE", "off_days.json"),
            limit,
            results_file: path_or(&get, "RESULTS_FILE", "results.json"),
            shots_dir: path_or(&get, "SHOTS_DIR", "shots"),
            headless,
            chrome_path: get("CHROME_PATH").filter(|p| !p.trim().is_empty()),
        })
    }
}

fn required<F>(get: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingValue(key)),
    }
}

fn path_or<F>(get: &F, key: &str, default: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => PathBuf::from(default),
    }
}

fn validate_url(name: &'static str, raw: &str) -> Result<(), ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: e.to_string(),
    })?;
    Ok(())
}
