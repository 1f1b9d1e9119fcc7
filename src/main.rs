//! Punchclock - batch clock in/out runner
//!
//! Reads its configuration from environment variables, processes every
//! account in the accounts file, and writes one result record per account.
//!
//! Exit codes:
//! - `0` - all processed accounts succeeded or were skipped
//! - `1` - at least one account failed (batch still ran to completion)
//! - `2` - configuration error; no account was processed

use chrono::Utc;
use tracing::{error, info};

use punchclock::accounts::load_accounts;
use punchclock::config::RunConfig;
use punchclock::report::RunReport;
use punchclock::runner::{run_batch, BrowserRunner};
use punchclock::schedule::{local_date_in, OffDayConfig};

#[tokio::main]
async fn main() {
    let guard = punchclock::init_logging();

    info!("Starting punchclock");
    if let Some(dir) = punchclock::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let code = run().await;

    // Flush the file appender before exiting.
    drop(guard);
    std::process::exit(code);
}

async fn run() -> i32 {
    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 2;
        }
    };

    let accounts = match load_accounts(&config.accounts_file) {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 2;
        }
    };

    let off_days = match OffDayConfig::load(&config.off_days_file) {
        Ok(off_days) => off_days,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 2;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.shots_dir) {
        error!("Cannot create {}: {}", config.shots_dir.display(), e);
        return 2;
    }

    // One "today" for the whole batch, in the configured zone.
    let today = local_date_in(&off_days.time_zone, Utc::now());
    info!("MODE = {}", config.mode);
    info!("Today is {} (zone: {})", today, zone_label(&off_days.time_zone));

    let runner = BrowserRunner::new(config.clone());
    let report = run_batch(&runner, &accounts, &off_days, today, config.limit).await;

    if let Err(e) = report.write(&config.results_file) {
        error!("Failed to write results: {:#}", e);
        return 1;
    }

    summarize(&report);
    if report.any_failed() {
        1
    } else {
        0
    }
}

fn zone_label(zone: &str) -> &str {
    let trimmed = zone.trim();
    if trimmed.is_empty() {
        "local"
    } else {
        trimmed
    }
}

fn summarize(report: &RunReport) {
    use punchclock::report::RunOutcome;

    let mut success = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for result in report.results() {
        match result.outcome {
            RunOutcome::Success => success += 1,
            RunOutcome::Skipped => skipped += 1,
            RunOutcome::Failed => failed += 1,
        }
    }
    info!(
        "Run complete: {} succeeded, {} skipped, {} failed",
        success, skipped, failed
    );
}
