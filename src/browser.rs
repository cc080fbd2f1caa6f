// src/browser.rs
//
// Headless-browser session management. One `BrowserSession` per scrape run;
// navigation is strictly sequential within a session and the underlying
// Chrome process is torn down through `close()` on every pipeline outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::ScrapeError;

const LOGIN_URL: &str = "https://www.linkedin.com/login";
const USERNAME_FIELD: &str = "#username";
const PASSWORD_FIELD: &str = "#password";
const SUBMIT_BUTTON: &str = "button[type='submit']";
// Element that only renders once the feed is reachable, i.e. login worked.
const LOGIN_MARKER: &str = ".feed-identity-module";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Wait/settle policy for a session. The source renders results client-side,
/// so a fixed post-navigation sleep is deliberate policy; tests inject
/// [`SettlePolicy::zero`] to run without delays.
#[derive(Debug, Clone)]
pub struct SettlePolicy {
    /// Upper bound on waiting for the login form and the post-login marker.
    pub login_timeout: Duration,
    /// Fixed sleep after navigation before reading the page source.
    pub render: Duration,
    /// Polling interval while waiting for a selector.
    pub poll: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        SettlePolicy {
            login_timeout: Duration::from_secs(10),
            render: Duration::from_secs(2),
            poll: Duration::from_millis(250),
        }
    }
}

impl SettlePolicy {
    pub fn zero() -> Self {
        SettlePolicy {
            login_timeout: Duration::ZERO,
            render: Duration::ZERO,
            poll: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// What pipeline stages need from a browser. `BrowserSession` is the real
/// implementation; tests substitute canned fakes.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Authenticates against the source. Fatal for the run when it fails;
    /// there is no retry.
    async fn login(&self) -> Result<(), ScrapeError>;

    /// Navigates to `url` and returns the rendered page source after the
    /// settle delay.
    async fn fetch_rendered_html(&self, url: &str) -> Result<String, ScrapeError>;

    /// Tears down the underlying browser. Safe to call more than once.
    async fn close(&self);
}

pub struct BrowserSession {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    closed: AtomicBool,
    logged_in: AtomicBool,
    credentials: Credentials,
    settle: SettlePolicy,
}

impl BrowserSession {
    /// Launches headless Chrome with a fixed window size and a realistic
    /// user agent, and opens the single working tab used for every
    /// navigation of this session.
    pub async fn launch(
        credentials: Credentials,
        settle: SettlePolicy,
    ) -> Result<Self, ScrapeError> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .args(vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                format!("--user-agent={USER_AGENT}"),
            ])
            .build()
            .map_err(ScrapeError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser event handler: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(ScrapeError::Launch(e.to_string()));
            }
        };

        info!("browser session launched");
        Ok(BrowserSession {
            browser: Mutex::new(browser),
            page,
            handler_task,
            closed: AtomicBool::new(false),
            logged_in: AtomicBool::new(false),
            credentials,
            settle,
        })
    }

    /// Polls for `selector` until it appears or the timeout elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.settle.poll).await;
        }
    }
}

#[async_trait]
impl PageSource for BrowserSession {
    async fn login(&self) -> Result<(), ScrapeError> {
        if self.logged_in.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.page
            .goto(LOGIN_URL)
            .await
            .map_err(|e| ScrapeError::Fetch(format!("login page: {e}")))?;

        if !self
            .wait_for_selector(USERNAME_FIELD, self.settle.login_timeout)
            .await
        {
            return Err(ScrapeError::Auth(
                "login page did not present a username field".to_string(),
            ));
        }

        let username = self.page.find_element(USERNAME_FIELD).await?;
        username.click().await?;
        username.type_str(&self.credentials.username).await?;

        let password = self.page.find_element(PASSWORD_FIELD).await?;
        password.click().await?;
        password.type_str(&self.credentials.password).await?;

        self.page.find_element(SUBMIT_BUTTON).await?.click().await?;

        if !self
            .wait_for_selector(LOGIN_MARKER, self.settle.login_timeout)
            .await
        {
            return Err(ScrapeError::Auth(
                "post-login marker never appeared; credentials rejected or a challenge was shown"
                    .to_string(),
            ));
        }

        self.logged_in.store(true, Ordering::SeqCst);
        info!("authenticated against {LOGIN_URL}");
        Ok(())
    }

    async fn fetch_rendered_html(&self, url: &str) -> Result<String, ScrapeError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))?;

        if !self.settle.render.is_zero() {
            tokio::time::sleep(self.settle.render).await;
        }

        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("browser wait: {e}");
        }
        self.handler_task.abort();
        info!("browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settle_policy_uses_observed_values() {
        let settle = SettlePolicy::default();
        assert_eq!(settle.login_timeout, Duration::from_secs(10));
        assert_eq!(settle.render, Duration::from_secs(2));
        assert_eq!(settle.poll, Duration::from_millis(250));
    }

    #[test]
    fn zero_settle_policy_has_no_delays() {
        let settle = SettlePolicy::zero();
        assert!(settle.login_timeout.is_zero());
        assert!(settle.render.is_zero());
        assert!(settle.poll.is_zero());
    }
}
