//! Field resolution with child-frame fallback
//!
//! Login forms sometimes render the credential inputs inside an embedded
//! iframe (e.g. third-party SSO widgets). A flat main-document lookup would
//! fail or hang on those pages, so resolution attempts the primary document
//! first and then falls back over the page's child documents in order,
//! stopping at the first visible match.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::BrowserError;

/// Visibility budget for the primary document attempt.
pub const PRIMARY_WAIT: Duration = Duration::from_secs(30);

/// Visibility budget for each child document attempt.
pub const CHILD_WAIT: Duration = Duration::from_secs(5);

/// A DOM scope that can be searched for a fillable field.
///
/// Implemented by the CDP-backed page scopes and by test fakes.
#[async_trait]
pub trait DocumentScope: Send + Sync {
    /// Label used in logs and fill locations ("main" or the frame URL).
    fn label(&self) -> String;

    /// Wait up to `timeout` for the first element matching `selector` to
    /// become visible in this scope, then set its value.
    async fn fill_first_visible(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;
}

/// Where a field was ultimately filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillLocation {
    Primary,
    Child { label: String },
}

/// Fill the first visible element matching `selector`, searching the primary
/// document and then each child document in enumeration order.
///
/// Short-circuits on the first scope that yields a visible match. Fails with
/// [`BrowserError::FieldNotFound`] only after every scope is exhausted.
/// Diagnostic capture (screenshot, HTML dump) is the caller's responsibility.
pub async fn fill_field<D: DocumentScope>(
    primary: &D,
    children: &[D],
    selector: &str,
    value: &str,
) -> Result<FillLocation, BrowserError> {
    match primary.fill_first_visible(selector, value, PRIMARY_WAIT).await {
        Ok(()) => {
            debug!("Filled {} in main document", selector);
            return Ok(FillLocation::Primary);
        }
        Err(e) => {
            info!("Main document fill failed for {} ({}). Trying frames...", selector, e);
        }
    }

    for child in children {
        match child.fill_first_visible(selector, value, CHILD_WAIT).await {
            Ok(()) => {
                info!("Filled {} in frame: {}", selector, child.label());
                return Ok(FillLocation::Child { label: child.label() });
            }
            Err(e) => {
                debug!("Frame {} has no visible {} ({})", child.label(), selector, e);
            }
        }
    }

    Err(BrowserError::FieldNotFound(selector.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    struct FakeScope {
        label: String,
        selectors: Vec<&'static str>,
        probes: AtomicUsize,
        filled: Mutex<Vec<(String, String)>>,
    }

    impl FakeScope {
        fn new(label: &str, selectors: Vec<&'static str>) -> Self {
            Self {
                label: label.to_string(),
                selectors,
                probes: AtomicUsize::new(0),
                filled: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentScope for FakeScope {
        fn label(&self) -> String {
            self.label.clone()
        }

        async fn fill_first_visible(
            &self,
            selector: &str,
            value: &str,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            self.probes.fetch_add(1, Ordering::Relaxed);
            if self.selectors.contains(&selector) {
                self.filled
                    .lock()
                    .unwrap()
                    .push((selector.to_string(), value.to_string()));
                Ok(())
            } else {
                Err(BrowserError::Timeout(format!("no visible {}", selector)))
            }
        }
    }

    #[tokio::test]
    async fn fills_in_primary_without_touching_children() {
        let primary = FakeScope::new("main", vec!["#user"]);
        let children = vec![FakeScope::new("frame-0", vec!["#user"])];

        let loc = fill_field(&primary, &children, "#user", "alice")
            .await
            .unwrap();

        assert_eq!(loc, FillLocation::Primary);
        assert_eq!(primary.filled.lock().unwrap().len(), 1);
        assert_eq!(children[0].probes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn falls_back_to_child_and_short_circuits() {
        let primary = FakeScope::new("main", vec![]);
        let children = vec![
            FakeScope::new("frame-0", vec![]),
            FakeScope::new("frame-1", vec!["#pass"]),
            FakeScope::new("frame-2", vec!["#pass"]),
        ];

        let loc = fill_field(&primary, &children, "#pass", "s3cret")
            .await
            .unwrap();

        assert_eq!(
            loc,
            FillLocation::Child {
                label: "frame-1".to_string()
            }
        );
        let filled = children[1].filled.lock().unwrap();
        assert_eq!(*filled, vec![("#pass".to_string(), "s3cret".to_string())]);
        // The remaining frame must not be probed once a match is found.
        assert_eq!(children[2].probes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn reports_field_not_found_after_exhausting_all_scopes() {
        let primary = FakeScope::new("main", vec!["#other"]);
        let children = vec![
            FakeScope::new("frame-0", vec![]),
            FakeScope::new("frame-1", vec![]),
        ];

        let err = fill_field(&primary, &children, "#missing", "x")
            .await
            .unwrap_err();

        match err {
            BrowserError::FieldNotFound(selector) => assert_eq!(selector, "#missing"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(children[0].probes.load(Ordering::Relaxed), 1);
        assert_eq!(children[1].probes.load(Ordering::Relaxed), 1);
    }
}
