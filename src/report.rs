//! Run results
//!
//! One record per account, appended in processing order and written out once
//! at the end of the run.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::schedule::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Skipped,
    Failed,
}

/// The outcome of one account's attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub account_tag: String,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn success(tag: impl Into<String>) -> Self {
        Self {
            account_tag: tag.into(),
            outcome: RunOutcome::Success,
            reason: None,
            error: None,
        }
    }

    pub fn skipped(tag: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            account_tag: tag.into(),
            outcome: RunOutcome::Skipped,
            reason: Some(reason),
            error: None,
        }
    }

    pub fn failed(tag: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            account_tag: tag.into(),
            outcome: RunOutcome::Failed,
            reason: None,
            error: Some(error.into()),
        }
    }
}

/// Append-only collection of run results.
#[derive(Debug, Default)]
pub struct RunReport {
    results: Vec<RunResult>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: RunResult) {
        match result.outcome {
            RunOutcome::Success => info!("{}: success", result.account_tag),
            RunOutcome::Skipped => {
                let reason = result
                    .reason
                    .map(|r| format!("{:?}", r))
                    .unwrap_or_else(|| "unspecified".to_string());
                info!("{}: skipped ({})", result.account_tag, reason);
            }
            RunOutcome::Failed => warn!(
                "{}: failed ({})",
                result.account_tag,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn any_failed(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.outcome == RunOutcome::Failed)
    }

    /// Serialize all results to a JSON file.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.results)
            .context("serializing run results")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing results to {}", path.display()))?;
        info!("Wrote {} results to {}", self.results.len(), path.display());
        Ok(())
    }
}
