//! Browser session management
//!
//! Handles launching and controlling one Chrome instance per account. Every
//! session gets its own user-data directory so credentials and cookies never
//! bleed between accounts.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::resolver::DocumentScope;
use super::BrowserError;

/// Find Chrome/Chromium executable on the system
fn find_chrome() -> Option<std::path::PathBuf> {
    let candidates: Vec<std::path::PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            std::path::PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            std::path::PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(std::path::PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![std::path::PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            std::path::PathBuf::from("/usr/bin/chromium"),
            std::path::PathBuf::from("/usr/bin/chromium-browser"),
            std::path::PathBuf::from("/usr/bin/google-chrome"),
            std::path::PathBuf::from("/usr/bin/google-chrome-stable"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Configuration for a browser session
#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    /// Path to Chrome/Chromium executable
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// User data directory
    pub user_data_dir: Option<String>,
    /// Per-operation timeout in seconds
    pub timeout_secs: u64,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            user_data_dir: None,
            timeout_secs: 60,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl BrowserSessionConfig {
    /// Create config for one account's session with a fresh data directory.
    pub fn for_account(tag: &str) -> Self {
        let dir = std::env::temp_dir()
            .join("punchclock")
            .join("browser_data")
            .join(format!("{}-{}", tag, uuid::Uuid::new_v4()));

        Self {
            user_data_dir: Some(dir.to_string_lossy().to_string()),
            ..Default::default()
        }
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set Chrome path
    pub fn chrome_path(mut self, path: Option<String>) -> Self {
        self.chrome_path = path;
        self
    }
}

/// A browser session for one account's attempt
pub struct BrowserSession {
    /// Display name (the account tag)
    pub id: String,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: tokio::task::JoinHandle<()>,
    alive: Arc<AtomicBool>,
    timeout_secs: u64,
}

impl BrowserSession {
    /// Launch a browser and open a blank page.
    pub async fn new(id: &str, config: BrowserSessionConfig) -> Result<Self, BrowserError> {
        info!("Launching browser session {} (headless: {})", id, config.headless);

        let chrome_path = config
            .chrome_path
            .clone()
            .map(std::path::PathBuf::from)
            .or_else(find_chrome)
            .ok_or_else(|| {
                BrowserError::LaunchFailed(
                    "Chrome/Chromium not found; install Chrome or set CHROME_PATH".to_string(),
                )
            })?;

        let mut builder = BrowserConfig::builder();
        builder = builder
            .chrome_executable(chrome_path)
            .window_size(config.window_width, config.window_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            // Required when running as root (e.g., in Docker or on a VPS)
            .arg("--no-sandbox");

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref dir) = config.user_data_dir {
            let _ = std::fs::create_dir_all(dir);
            builder = builder.user_data_dir(dir);
        }

        let browser_config = builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // When the handler stream ends, Chrome has disconnected or crashed.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        let id_for_handler = id.to_string();
        let handler_task = tokio::spawn(async move {
            while (handler.next().await).is_some() {}
            warn!("Session {} Chrome disconnected (event handler ended)", id_for_handler);
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        debug!("Browser session {} created", id);

        Ok(Self {
            id: id.to_string(),
            browser: Some(browser),
            page: Some(page),
            handler_task,
            alive,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Check if the session is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))
    }

    /// Navigate to a URL
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        debug!("Session {} navigating to: {}", self.id, url);

        tokio::time::timeout(Duration::from_secs(self.timeout_secs), page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(format!("Navigation to {} timed out", url)))?
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    /// Wait for the next navigation to complete, bounded by `timeout_secs`.
    pub async fn wait_for_navigation(&self, timeout_secs: u64) -> Result<(), BrowserError> {
        let page = self.page()?;

        tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            page.wait_for_navigation(),
        )
        .await
        .map_err(|_| BrowserError::Timeout("Navigation timeout".into()))?
        .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    /// Execute JavaScript on the page with a bounded timeout.
    pub async fn execute_js(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let page = self.page()?;

        let result = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            page.evaluate(script),
        )
        .await
        .map_err(|_| {
            BrowserError::Timeout(format!(
                "JavaScript execution timed out after {}s",
                self.timeout_secs
            ))
        })?
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Get current URL
    pub async fn current_url(&self) -> Result<String, BrowserError> {
        let page = self.page()?;
        page.url()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))?
            .ok_or_else(|| BrowserError::ConnectionLost("No URL".into()))
    }

    /// Click on an element by selector
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let page = self.page()?;

        let element = page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(())
    }

    /// Capture a full-page PNG screenshot to the given path.
    pub async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let page = self.page()?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        let png = page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::JavaScriptError(format!("screenshot failed: {}", e)))?;

        std::fs::write(path, png)?;
        Ok(())
    }

    /// Raw HTML of the current page.
    pub async fn content(&self) -> Result<String, BrowserError> {
        let page = self.page()?;
        page.content()
            .await
            .map_err(|e| BrowserError::ConnectionLost(e.to_string()))
    }

    /// Scope representing the page's primary document.
    pub fn main_scope(&self) -> Result<PageScope, BrowserError> {
        Ok(PageScope {
            page: self.page()?.clone(),
            target: ScopeTarget::Main,
        })
    }

    /// Scopes for the page's child documents (iframes), in DOM order.
    pub async fn child_scopes(&self) -> Result<Vec<PageScope>, BrowserError> {
        let page = self.page()?;

        let eval = page
            .evaluate(r#"Array.from(document.querySelectorAll("iframe")).map(f => f.src || "")"#)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        let srcs: Vec<String> = eval.into_value().unwrap_or_default();

        Ok(srcs
            .into_iter()
            .enumerate()
            .map(|(index, src)| PageScope {
                page: page.clone(),
                target: ScopeTarget::ChildFrame { index, src },
            })
            .collect())
    }

    /// Close the browser session. Safe to call on a dead session.
    pub async fn close(mut self) {
        self.alive.store(false, Ordering::Relaxed);

        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = self.browser.take() {
            // Graceful close first, then force kill so no Chrome processes
            // outlive the account's attempt.
            let _ = browser.close().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = browser.kill().await;
        }

        self.handler_task.abort();
        info!("Browser session {} closed", self.id);
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// A fillable DOM scope on a live page: the main document or one iframe.
pub struct PageScope {
    page: Page,
    target: ScopeTarget,
}

enum ScopeTarget {
    Main,
    ChildFrame { index: usize, src: String },
}

impl PageScope {
    /// Expression yielding the scope's document object inside page JS.
    ///
    /// Cross-origin frames have a null `contentDocument` and therefore time
    /// out rather than match.
    fn document_expr(&self) -> String {
        match &self.target {
            ScopeTarget::Main => "document".to_string(),
            ScopeTarget::ChildFrame { index, .. } => format!(
                r#"(document.querySelectorAll("iframe")[{}] || {{}}).contentDocument"#,
                index
            ),
        }
    }
}

/// Escape a string for embedding in a double-quoted JS literal.
fn js_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl DocumentScope for PageScope {
    fn label(&self) -> String {
        match &self.target {
            ScopeTarget::Main => "main".to_string(),
            ScopeTarget::ChildFrame { index, src } if src.is_empty() => {
                format!("frame-{}", index)
            }
            ScopeTarget::ChildFrame { index, src } => format!("frame-{} ({})", index, src),
        }
    }

    async fn fill_first_visible(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        // Poll with page JS: chromiumoxide has no stable per-frame
        // wait-for-visible API surface.
        let script = format!(
            r#"
            (async () => {{
                const deadline = Date.now() + {timeout_ms};
                while (Date.now() < deadline) {{
                    const doc = {document_expr};
                    if (doc) {{
                        const el = doc.querySelector("{selector}");
                        if (el && el.offsetParent !== null) {{
                            el.focus();
                            el.value = "{value}";
                            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                            return true;
                        }}
                    }}
                    await new Promise(r => setTimeout(r, 250));
                }}
                return false;
            }})()
            "#,
            timeout_ms = timeout.as_millis(),
            document_expr = self.document_expr(),
            selector = js_string(selector),
            value = js_string(value),
        );

        let eval = tokio::time::timeout(
            timeout + Duration::from_secs(5),
            self.page.evaluate(script),
        )
        .await
        .map_err(|_| BrowserError::Timeout(format!("visibility wait for {} timed out", selector)))?
        .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        if eval.into_value::<bool>().unwrap_or(false) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!(
                "no visible match for {} in {}",
                selector,
                self.label()
            )))
        }
    }
}
