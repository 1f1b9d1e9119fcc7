//! The punch sequence for one account
//!
//! Mirrors the manual flow: open the login page, fill the credential fields
//! (falling back to iframes when the form is embedded), submit, open the
//! target page, and click the clock in/out control. Screenshots are captured
//! after each step for later inspection.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::resolver::fill_field;
use super::{BrowserError, BrowserSession};
use crate::accounts::Account;
use crate::config::RunConfig;

/// Drives the login-and-punch sequence on an open session.
pub struct PunchActions;

impl PunchActions {
    /// Run the full sequence for one account. Any error aborts this
    /// account's attempt only; the caller records it and moves on.
    pub async fn run(
        session: &BrowserSession,
        config: &RunConfig,
        account: &Account,
    ) -> Result<(), BrowserError> {
        let tag = account.tag();

        info!("Session {}: go login: {}", tag, config.login_url);
        session.navigate(&config.login_url).await?;
        if let Ok(url) = session.current_url().await {
            info!("Session {}: URL after goto: {}", tag, url);
        }
        Self::shot(session, &config.shots_dir, &tag, "01-login-page").await;

        let main = session.main_scope()?;
        let frames = session.child_scopes().await.unwrap_or_default();

        fill_field(&main, &frames, &config.username_selector, &account.username).await?;
        fill_field(&main, &frames, &config.password_selector, &account.password).await?;

        info!("Session {}: click submit", tag);
        session.click(&config.submit_selector).await?;
        // Login may complete with a navigation or in place; don't fail the
        // attempt when no navigation event arrives.
        if let Err(e) = session.wait_for_navigation(30).await {
            warn!("Session {}: no navigation after submit ({})", tag, e);
        }
        Self::shot(session, &config.shots_dir, &tag, "03-after-login").await;

        info!("Session {}: go target: {}", tag, config.target_url);
        session.navigate(&config.target_url).await?;
        Self::shot(session, &config.shots_dir, &tag, "04-target").await;

        info!("Session {}: click button: {}", tag, config.mode);
        session.click(&config.button_selector).await?;
        Self::shot(session, &config.shots_dir, &tag, "05-after-click").await;

        info!("Session {}: done, {} clicked", tag, config.mode);
        Ok(())
    }

    /// Best-effort diagnostic capture after a failed attempt: an error
    /// screenshot plus a raw HTML dump for DOM inspection.
    pub async fn capture_failure(session: &BrowserSession, config: &RunConfig, tag: &str) {
        let shot = shot_path(&config.shots_dir, tag, &format!("error-{}", config.mode));
        if let Err(e) = session.screenshot(&shot).await {
            warn!("Session {}: failure screenshot failed: {}", tag, e);
        }

        match session.content().await {
            Ok(html) => {
                let dump = config.shots_dir.join(format!("{}-debug.html", tag));
                if let Err(e) = std::fs::write(&dump, html) {
                    warn!("Session {}: HTML dump failed: {}", tag, e);
                }
            }
            Err(e) => warn!("Session {}: could not read page content: {}", tag, e),
        }
    }

    async fn shot(session: &BrowserSession, dir: &Path, tag: &str, step: &str) {
        let path = shot_path(dir, tag, step);
        if let Err(e) = session.screenshot(&path).await {
            warn!("Session {}: screenshot {} failed: {}", tag, step, e);
        }
    }
}

fn shot_path(dir: &Path, tag: &str, step: &str) -> PathBuf {
    dir.join(format!("{}-{}.png", tag, step))
}
