//! Fetch Layer: resolve a URL to HTML.
//!
//! A fetch is a small state machine:
//!
//! 1. fresh cache entry → [`FetchOutcome::Cached`]
//! 2. static GET (bounded retries) → page or classified failure
//! 3. page looks like a client-rendered shell → discard it and render
//!    → [`FetchOutcome::Rendered`] or a `render_failed` failure
//! 4. otherwise → [`FetchOutcome::Static`]
//!
//! Successful pages are cached with the method that produced them. Normal
//! failure modes never surface as `Err`: the caller always gets a
//! [`FetchOutcome`] it can classify for retry purposes.

pub mod cache;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod client;
pub mod render;
pub mod spa;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use cfpscout_shared::{FailureReason, FetchConfig, FetchMethod, Result};

pub use cache::{CachedPage, HtmlCache};
#[cfg(feature = "chromium")]
pub use chromium::ChromiumLauncher;
pub use client::StaticResponse;
pub use render::{BrowserLauncher, BrowserSession, DisabledRenderer, HeadlessRenderer, Renderer};
pub use spa::needs_rendering;

/// Per-call knobs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-attempt static timeout.
    pub timeout: Duration,
    /// Static attempts (1..=3).
    pub retries: u32,
    /// Consult and populate the HTML cache.
    pub use_cache: bool,
}

/// Terminal state of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from the cache; `method` is how the cached HTML was obtained.
    Cached { html: String, method: FetchMethod },
    /// Served by a plain GET.
    Static { html: String, http_status: u16 },
    /// Static HTML was a shell; served by the renderer. `http_status` is
    /// the status of the GET that returned the shell.
    Rendered { html: String, http_status: u16 },
    /// No HTML. `is_spa` is set when the static page was a shell and the
    /// rendered path failed.
    Failed {
        http_status: Option<u16>,
        reason: FailureReason,
        is_spa: bool,
    },
}

impl FetchOutcome {
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Cached { html, .. } | Self::Static { html, .. } | Self::Rendered { html, .. } => {
                Some(html.as_str())
            }
            Self::Failed { .. } => None,
        }
    }

    /// How the HTML was obtained (cache hits report the original method).
    pub fn method(&self) -> FetchMethod {
        match self {
            Self::Cached { method, .. } => *method,
            Self::Rendered { .. } => FetchMethod::Rendered,
            Self::Static { .. } | Self::Failed { .. } => FetchMethod::Static,
        }
    }

    pub fn is_spa(&self) -> bool {
        match self {
            Self::Cached { method, .. } => *method == FetchMethod::Rendered,
            Self::Rendered { .. } => true,
            Self::Static { .. } => false,
            Self::Failed { is_spa, .. } => *is_spa,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Static { http_status, .. } | Self::Rendered { http_status, .. } => {
                Some(*http_status)
            }
            Self::Failed { http_status, .. } => *http_status,
            Self::Cached { .. } => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached { .. } => "cached",
            Self::Static { .. } => "static",
            Self::Rendered { .. } => "rendered",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Two-tier fetcher. Cheap to clone; clones share the HTTP client, cache and
/// renderer.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    cache: Arc<HtmlCache>,
    renderer: Arc<dyn Renderer>,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a fetcher caching under `cache_dir`. With `config.render`
    /// unset, `renderer` is never called.
    pub fn new(config: FetchConfig, cache_dir: &Path, renderer: Arc<dyn Renderer>) -> Result<Self> {
        Ok(Self {
            client: client::build_client()?,
            cache: Arc::new(HtmlCache::new(cache_dir, config.cache_ttl)),
            renderer,
            config,
        })
    }

    /// Options taken from the fetch config.
    pub fn default_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.config.timeout,
            retries: self.config.retries,
            use_cache: true,
        }
    }

    pub fn cache(&self) -> &HtmlCache {
        &self.cache
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> FetchOutcome {
        let parsed = match Url::parse(url.trim()) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            _ => {
                debug!("not an http(s) URL");
                return FetchOutcome::Failed {
                    http_status: None,
                    reason: FailureReason::InvalidUrl,
                    is_spa: false,
                };
            }
        };

        if opts.use_cache {
            if let Some(hit) = self.cache.get(url).await {
                debug!(method = %hit.method, "cache hit");
                return FetchOutcome::Cached {
                    html: hit.html,
                    method: hit.method,
                };
            }
        }

        let (html, http_status) = match client::fetch_static(
            &self.client,
            &parsed,
            opts.timeout,
            opts.retries.clamp(1, 3),
            self.config.base_delay,
        )
        .await
        {
            StaticResponse::Page { html, http_status } => (html, http_status),
            StaticResponse::Failed {
                http_status,
                reason,
            } => {
                return FetchOutcome::Failed {
                    http_status,
                    reason,
                    is_spa: false,
                };
            }
        };

        if !spa::needs_rendering(&html) {
            if opts.use_cache {
                self.cache.put(url, FetchMethod::Static, &html).await;
            }
            return FetchOutcome::Static { html, http_status };
        }

        info!("client-rendered shell detected, escalating to renderer");
        let rendered = if self.config.render {
            self.renderer
                .render(&parsed, self.config.render_timeout)
                .await
        } else {
            debug!("rendering disabled by config");
            None
        };

        match rendered {
            Some(html) => {
                if opts.use_cache {
                    self.cache.put(url, FetchMethod::Rendered, &html).await;
                }
                FetchOutcome::Rendered { html, http_status }
            }
            None => FetchOutcome::Failed {
                http_status: Some(http_status),
                reason: FailureReason::RenderFailed,
                is_spa: true,
            },
        }
    }
}
