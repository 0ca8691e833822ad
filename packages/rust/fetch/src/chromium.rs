//! Headless Chromium backend, enabled with the `chromium` feature.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use cfpscout_shared::{CfpScoutError, Result};

use crate::render::{BrowserLauncher, BrowserSession};

/// Launches a fresh headless Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    /// Extra command-line switches passed to Chromium.
    pub args: Vec<String>,
}

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self {
            args: vec!["--no-sandbox".into(), "--disable-gpu".into()],
        }
    }
}

impl Default for ChromiumLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let config = BrowserConfig::builder()
            .args(self.args.iter().map(String::as_str))
            .build()
            .map_err(CfpScoutError::Rendering)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CfpScoutError::Rendering(format!("launch: {e}")))?;

        // The CDP handler must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(CfpScoutError::Rendering(format!("new page: {e}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| CfpScoutError::Rendering(format!("goto: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| CfpScoutError::Rendering(format!("navigation: {e}")))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| CfpScoutError::Rendering(format!("click {selector}: {e}")))?;
        Ok(true)
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| CfpScoutError::Rendering(format!("content: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;

        if let Err(e) = page.close().await {
            debug!(error = %e, "page close failed");
        }
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        closed
            .map(|_| ())
            .map_err(|e| CfpScoutError::Rendering(format!("close: {e}")))
    }
}
