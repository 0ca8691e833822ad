//! Rendered fetch path.
//!
//! [`Renderer`] is the black-box collaborator the [`crate::Fetcher`] escalates
//! to. [`HeadlessRenderer`] drives any [`BrowserLauncher`] through the
//! settle / dismiss-consent / settle / capture sequence; the browser itself is
//! pluggable (see the `chromium` feature).

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use cfpscout_shared::Result;

/// Consent-overlay buttons, tried in order. Reject-style buttons come first.
pub const CONSENT_SELECTORS: &[&str] = &[
    "#onetrust-reject-all-handler",
    "#CybotCookiebotDialogBodyButtonDecline",
    "[data-testid='uc-deny-all-button']",
    ".cc-deny",
    "button[aria-label*='reject' i]",
    "button[id*='reject' i]",
    "button[class*='reject' i]",
    "#onetrust-accept-btn-handler",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "[data-testid='uc-accept-all-button']",
    ".cc-allow",
    ".cc-accept",
    "button[aria-label*='accept' i]",
    "button[id*='accept' i]",
    "button[class*='accept' i]",
];

/// Render a URL to HTML. `None` means the page could not be rendered.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url, timeout: Duration) -> Option<String>;
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One open browser tab.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &Url) -> Result<()>;

    /// Click the first element matching `selector`. `Ok(false)` when nothing
    /// matched.
    async fn click(&mut self, selector: &str) -> Result<bool>;

    /// Serialized DOM of the current page.
    async fn content(&mut self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Renderer used when rendering is switched off or no browser is built in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, url: &Url, _timeout: Duration) -> Option<String> {
        debug!(%url, "rendering disabled");
        None
    }
}

/// Browser-driven renderer.
pub struct HeadlessRenderer<L> {
    launcher: L,
    settle: Duration,
}

impl<L: BrowserLauncher> HeadlessRenderer<L> {
    pub fn new(launcher: L, settle: Duration) -> Self {
        Self { launcher, settle }
    }
}

#[async_trait]
impl<L: BrowserLauncher> Renderer for HeadlessRenderer<L> {
    /// `timeout` bounds the whole render, so launch and capture share one
    /// deadline.
    #[instrument(skip_all, fields(url = %url))]
    async fn render(&self, url: &Url, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let mut session = match tokio::time::timeout_at(deadline, self.launcher.launch()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                warn!(error = %e, "browser launch failed");
                return None;
            }
            Err(_) => {
                warn!("browser launch timed out");
                return None;
            }
        };

        let captured =
            tokio::time::timeout_at(deadline, capture(session.as_mut(), url, self.settle)).await;

        if let Err(e) = session.close().await {
            debug!(error = %e, "browser session close failed");
        }

        match captured {
            Ok(Ok(html)) if !html.trim().is_empty() => Some(html),
            Ok(Ok(_)) => {
                warn!("rendered document is empty");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "rendering failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "rendering timed out");
                None
            }
        }
    }
}

async fn capture(session: &mut dyn BrowserSession, url: &Url, settle: Duration) -> Result<String> {
    session.goto(url).await?;
    tokio::time::sleep(settle).await;

    if let Some(selector) = dismiss_consent(session).await {
        debug!(selector, "dismissed consent overlay");
        tokio::time::sleep(settle).await;
    }

    session.content().await
}

/// Click the first consent button that exists. Returns its selector.
pub async fn dismiss_consent(session: &mut dyn BrowserSession) -> Option<&'static str> {
    for &selector in CONSENT_SELECTORS {
        match session.click(selector).await {
            Ok(true) => return Some(selector),
            Ok(false) => {}
            Err(e) => debug!(selector, error = %e, "consent click failed"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use cfpscout_shared::CfpScoutError;

    #[derive(Default)]
    struct Script {
        /// Selectors present on the fake page.
        buttons: Vec<&'static str>,
        fail_goto: bool,
        hang_goto: bool,
        launch_delay: Duration,
        goto_delay: Duration,
        html: String,
    }

    #[derive(Clone, Default)]
    struct FakeLauncher {
        script: Arc<Script>,
        log: Arc<Mutex<Vec<String>>>,
    }

    struct FakeSession {
        script: Arc<Script>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            self.log.lock().unwrap().push("launch".into());
            tokio::time::sleep(self.script.launch_delay).await;
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
                log: self.log.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn goto(&mut self, url: &Url) -> Result<()> {
            self.log.lock().unwrap().push(format!("goto {url}"));
            tokio::time::sleep(self.script.goto_delay).await;
            if self.script.hang_goto {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.script.fail_goto {
                return Err(CfpScoutError::Rendering("navigation failed".into()));
            }
            Ok(())
        }

        async fn click(&mut self, selector: &str) -> Result<bool> {
            let hit = self.script.buttons.iter().any(|b| *b == selector);
            if hit {
                self.log.lock().unwrap().push(format!("click {selector}"));
            }
            Ok(hit)
        }

        async fn content(&mut self) -> Result<String> {
            Ok(self.script.html.clone())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.log.lock().unwrap().push("close".into());
            Ok(())
        }
    }

    fn launcher(script: Script) -> FakeLauncher {
        FakeLauncher {
            script: Arc::new(script),
            log: Arc::default(),
        }
    }

    fn url() -> Url {
        Url::parse("https://spa.example.com/cfp").unwrap()
    }

    #[tokio::test]
    async fn captures_rendered_document() {
        let fake = launcher(Script {
            html: "<html><body><h1>Rendered</h1></body></html>".into(),
            ..Script::default()
        });
        let renderer = HeadlessRenderer::new(fake.clone(), Duration::ZERO);

        let html = renderer.render(&url(), Duration::from_secs(5)).await;
        assert_eq!(html.as_deref(), Some("<html><body><h1>Rendered</h1></body></html>"));

        let log = fake.log.lock().unwrap().clone();
        assert_eq!(log, ["launch", "goto https://spa.example.com/cfp", "close"]);
    }

    #[tokio::test]
    async fn reject_is_preferred_over_accept() {
        let fake = launcher(Script {
            buttons: vec!["#onetrust-accept-btn-handler", "#onetrust-reject-all-handler"],
            html: "<p>x</p>".into(),
            ..Script::default()
        });
        let renderer = HeadlessRenderer::new(fake.clone(), Duration::ZERO);
        renderer.render(&url(), Duration::from_secs(5)).await;

        let clicks: Vec<String> = fake
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.starts_with("click"))
            .cloned()
            .collect();
        assert_eq!(clicks, ["click #onetrust-reject-all-handler"]);
    }

    #[tokio::test]
    async fn accept_used_when_no_reject_button() {
        let fake = launcher(Script {
            buttons: vec![".cc-allow"],
            html: "<p>x</p>".into(),
            ..Script::default()
        });
        let mut session = fake.launch().await.unwrap();
        assert_eq!(dismiss_consent(session.as_mut()).await, Some(".cc-allow"));
    }

    #[tokio::test]
    async fn navigation_error_yields_none_and_closes() {
        let fake = launcher(Script {
            fail_goto: true,
            ..Script::default()
        });
        let renderer = HeadlessRenderer::new(fake.clone(), Duration::ZERO);
        assert!(renderer.render(&url(), Duration::from_secs(5)).await.is_none());
        assert_eq!(fake.log.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn hung_navigation_times_out() {
        let fake = launcher(Script {
            hang_goto: true,
            ..Script::default()
        });
        let renderer = HeadlessRenderer::new(fake.clone(), Duration::ZERO);
        assert!(renderer.render(&url(), Duration::from_millis(50)).await.is_none());
        assert_eq!(fake.log.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn launch_and_capture_share_one_timeout() {
        let fake = launcher(Script {
            launch_delay: Duration::from_millis(150),
            goto_delay: Duration::from_millis(150),
            html: "<p>late</p>".into(),
            ..Script::default()
        });
        let renderer = HeadlessRenderer::new(fake.clone(), Duration::ZERO);
        assert!(renderer.render(&url(), Duration::from_millis(200)).await.is_none());
        assert_eq!(fake.log.lock().unwrap().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn empty_document_is_a_failure() {
        let fake = launcher(Script::default());
        let renderer = HeadlessRenderer::new(fake, Duration::ZERO);
        assert!(renderer.render(&url(), Duration::from_secs(5)).await.is_none());
    }

    #[tokio::test]
    async fn disabled_renderer_never_renders() {
        assert!(DisabledRenderer.render(&url(), Duration::from_secs(1)).await.is_none());
    }
}
