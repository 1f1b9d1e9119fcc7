//! Sequential batch orchestration
//!
//! Processes accounts strictly in order, one at a time. Each account gets its
//! own error boundary: a failed attempt is recorded and the loop moves on.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

use crate::accounts::Account;
use crate::browser::{BrowserError, BrowserSession, BrowserSessionConfig, PunchActions};
use crate::config::RunConfig;
use crate::report::{RunReport, RunResult};
use crate::schedule::{jitter_sleep, should_skip, OffDayConfig};

/// One account's attempt, behind a trait so the batch loop's contract can be
/// exercised without a browser.
#[async_trait]
pub trait AccountRunner: Send + Sync {
    async fn attempt(&self, account: &Account) -> Result<(), BrowserError>;
}

/// The real runner: one isolated browser session per account.
pub struct BrowserRunner {
    config: RunConfig,
}

impl BrowserRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AccountRunner for BrowserRunner {
    async fn attempt(&self, account: &Account) -> Result<(), BrowserError> {
        let tag = account.tag();

        let session_config = BrowserSessionConfig::for_account(&tag)
            .headless(self.config.headless)
            .chrome_path(self.config.chrome_path.clone());
        let session = BrowserSession::new(&tag, session_config).await?;

        let result = PunchActions::run(&session, &self.config, account).await;
        if result.is_err() {
            PunchActions::capture_failure(&session, &self.config, &tag).await;
        }

        // Teardown happens on every path so one account's Chrome never
        // outlives its attempt.
        session.close().await;
        result
    }
}

/// Run the batch: gate each account through the off-day rules, attempt the
/// rest, and record exactly one result per account in input order.
///
/// `today` is computed once by the caller so every account shares the same
/// calendar day. The between-accounts delay applies after every account
/// except the last, including skipped ones.
pub async fn run_batch<R: AccountRunner>(
    runner: &R,
    accounts: &[Account],
    off_days: &OffDayConfig,
    today: NaiveDate,
    limit: Option<usize>,
) -> RunReport {
    let mut report = RunReport::new();

    let count = limit.unwrap_or(accounts.len()).min(accounts.len());
    if count < accounts.len() {
        info!("Limiting run to the first {} of {} accounts", count, accounts.len());
    }
    let batch = &accounts[..count];

    jitter_sleep(off_days.start_delay, "Start delay").await;

    for (index, account) in batch.iter().enumerate() {
        let tag = display_tag(account, index);
        info!("[{}/{}] Processing {}", index + 1, batch.len(), tag);

        if !account.is_complete() {
            report.record(RunResult::failed(tag.as_str(), "missing username or password"));
        } else if let Some(reason) = should_skip(account, today, off_days) {
            report.record(RunResult::skipped(tag.as_str(), reason));
        } else {
            match runner.attempt(account).await {
                Ok(()) => report.record(RunResult::success(tag.as_str())),
                Err(e) => report.record(RunResult::failed(tag.as_str(), e.to_string())),
            }
        }

        if index + 1 < batch.len() {
            jitter_sleep(off_days.between_accounts_delay, "Between accounts").await;
        }
    }

    report
}

/// Result tag for an account; entries without a username get a positional
/// placeholder so their records stay distinguishable.
fn display_tag(account: &Account, index: usize) -> String {
    if account.username.is_empty() {
        format!("account-{}", index + 1)
    } else {
        account.tag()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::report::RunOutcome;
    use crate::schedule::SkipReason;

    struct FakeRunner {
        fail_for: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self {
                fail_for: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_for(usernames: &[&str]) -> Self {
            Self {
                fail_for: usernames.iter().map(|u| u.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountRunner for FakeRunner {
        async fn attempt(&self, account: &Account) -> Result<(), BrowserError> {
            self.calls.lock().unwrap().push(account.username.clone());
            if self.fail_for.contains(&account.username) {
                Err(BrowserError::FieldNotFound("#user".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn account(username: &str) -> Account {
        Account {
            username: username.to_string(),
            password: "pw".to_string(),
        }
    }

    fn accounts(usernames: &[&str]) -> Vec<Account> {
        usernames.iter().map(|u| account(u)).collect()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn one_result_per_account_in_input_order() {
        let runner = FakeRunner::new();
        let list = accounts(&["alice", "bob", "carol"]);

        let report = run_batch(&runner, &list, &OffDayConfig::default(), date("2026-08-10"), None).await;

        let tags: Vec<_> = report.results().iter().map(|r| r.account_tag.clone()).collect();
        assert_eq!(tags, ["alice", "bob", "carol"]);
        assert_eq!(runner.calls(), ["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn a_failing_account_does_not_stop_the_batch() {
        let runner = FakeRunner::failing_for(&["alice"]);
        let list = accounts(&["alice", "bob"]);

        let report = run_batch(&runner, &list, &OffDayConfig::default(), date("2026-08-10"), None).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.results()[0].outcome, RunOutcome::Failed);
        assert_eq!(report.results()[1].outcome, RunOutcome::Success);
        assert_eq!(runner.calls(), ["alice", "bob"]);
        assert!(report.any_failed());
    }

    #[tokio::test]
    async fn limit_caps_the_batch_to_the_first_n() {
        let runner = FakeRunner::new();
        let list = accounts(&["a", "b", "c", "d", "e"]);

        let report = run_batch(&runner, &list, &OffDayConfig::default(), date("2026-08-10"), Some(1)).await;

        assert_eq!(report.len(), 1);
        assert_eq!(runner.calls(), ["a"]);
    }

    #[tokio::test]
    async fn saturday_with_skip_weekends_skips_every_account() {
        let runner = FakeRunner::new();
        let list = accounts(&["alice", "bob"]);
        let off_days = OffDayConfig {
            skip_weekends: true,
            ..Default::default()
        };

        let report = run_batch(&runner, &list, &off_days, date("2026-08-08"), None).await;

        assert_eq!(report.len(), 2);
        for result in report.results() {
            assert_eq!(result.outcome, RunOutcome::Skipped);
            assert_eq!(result.reason, Some(SkipReason::Weekend));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn global_off_date_skips_all_on_a_weekday() {
        let runner = FakeRunner::new();
        let list = accounts(&["alice", "bob"]);
        let new_year = date("2026-01-01");
        let off_days = OffDayConfig {
            global_off_dates: [new_year].into_iter().collect(),
            ..Default::default()
        };

        let report = run_batch(&runner, &list, &off_days, new_year, None).await;

        for result in report.results() {
            assert_eq!(result.outcome, RunOutcome::Skipped);
            assert_eq!(result.reason, Some(SkipReason::GlobalOff));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn per_user_off_date_skips_only_that_account() {
        let runner = FakeRunner::new();
        let list = accounts(&["alice", "bob"]);
        let day = date("2026-03-02");
        let off_days = OffDayConfig {
            per_user_off_dates: [("alice".to_string(), [day].into_iter().collect())]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        let report = run_batch(&runner, &list, &off_days, day, None).await;

        assert_eq!(report.results()[0].outcome, RunOutcome::Skipped);
        assert_eq!(report.results()[0].reason, Some(SkipReason::UserOff));
        assert_eq!(report.results()[1].outcome, RunOutcome::Success);
        assert_eq!(runner.calls(), ["bob"]);
    }

    #[tokio::test]
    async fn incomplete_account_is_recorded_failed_without_an_attempt() {
        let runner = FakeRunner::new();
        let list = vec![
            Account {
                username: "alice".to_string(),
                password: String::new(),
            },
            account("bob"),
        ];

        let report = run_batch(&runner, &list, &OffDayConfig::default(), date("2026-08-10"), None).await;

        assert_eq!(report.results()[0].outcome, RunOutcome::Failed);
        assert_eq!(report.results()[1].outcome, RunOutcome::Success);
        assert_eq!(runner.calls(), ["bob"]);
    }

    #[tokio::test]
    async fn nameless_entries_get_positional_tags() {
        let runner = FakeRunner::new();
        let list = vec![Account {
            username: String::new(),
            password: "pw".to_string(),
        }];

        let report = run_batch(&runner, &list, &OffDayConfig::default(), date("2026-08-10"), None).await;

        assert_eq!(report.results()[0].account_tag, "account-1");
        assert_eq!(report.results()[0].outcome, RunOutcome::Failed);
    }
}
