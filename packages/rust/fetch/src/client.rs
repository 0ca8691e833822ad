//! Static HTTP path: GET with a rotated browser user-agent, bounded retries,
//! and classified failures.

use std::error::Error as _;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{Client, Response, StatusCode, header};
use tracing::{debug, warn};
use url::Url;

use cfpscout_shared::{CfpScoutError, FailureReason, Result};

/// Desktop browser user-agents; one is picked per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Upper bound for a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Result of the static path.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticResponse {
    Page { html: String, http_status: u16 },
    Failed {
        http_status: Option<u16>,
        reason: FailureReason,
    },
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Build the shared HTTP client. Redirects are followed; per-request
/// timeouts are applied by [`fetch_static`].
pub fn build_client() -> Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| CfpScoutError::Network(format!("failed to build HTTP client: {e}")))
}

/// Statuses that no amount of retrying will change.
fn is_permanent_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 403 | 404 | 410)
}

/// Statuses worth another attempt within the same fetch.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// GET `url` up to `attempts` times with exponential backoff
/// (`base_delay × 2^attempt`) between attempts.
pub async fn fetch_static(
    client: &Client,
    url: &Url,
    timeout: Duration,
    attempts: u32,
    base_delay: Duration,
) -> StaticResponse {
    let attempts = attempts.max(1);
    let mut last = StaticResponse::Failed {
        http_status: None,
        reason: FailureReason::Other("no_attempt".into()),
    };

    for attempt in 0..attempts {
        let backoff = base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let mut wait = backoff;

        match send(client, url, timeout).await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    match resp.text().await {
                        Ok(html) => {
                            return StaticResponse::Page {
                                html,
                                http_status: status.as_u16(),
                            };
                        }
                        Err(e) => {
                            debug!(%url, attempt, error = %e, "body read failed");
                            last = StaticResponse::Failed {
                                http_status: Some(status.as_u16()),
                                reason: classify_error(&e),
                            };
                        }
                    }
                } else {
                    let code = status.as_u16();
                    debug!(%url, attempt, status = code, "http error status");
                    last = StaticResponse::Failed {
                        http_status: Some(code),
                        reason: FailureReason::Http(code),
                    };
                    if is_permanent_status(status) || !is_transient_status(status) {
                        return last;
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if let Some(after) = retry_after(&resp) {
                            wait = after;
                        }
                    }
                }
            }
            Err(e) => {
                let reason = classify_error(&e);
                debug!(%url, attempt, %reason, error = %e, "request failed");
                last = StaticResponse::Failed {
                    http_status: None,
                    reason,
                };
            }
        }

        if attempt + 1 < attempts {
            tokio::time::sleep(wait).await;
        }
    }

    if let StaticResponse::Failed { reason, .. } = &last {
        warn!(%url, %reason, attempts, "static fetch exhausted attempts");
    }
    last
}

async fn send(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> std::result::Result<Response, reqwest::Error> {
    client
        .get(url.as_str())
        .header(header::USER_AGENT, random_user_agent())
        .header(
            header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .timeout(timeout)
        .send()
        .await
}

/// Numeric `Retry-After` seconds, capped.
fn retry_after(resp: &Response) -> Option<Duration> {
    let secs: u64 = resp
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Map a transport error to its failure class.
pub fn classify_error(e: &reqwest::Error) -> FailureReason {
    if is_tls_error(e) {
        FailureReason::SslError
    } else if e.is_timeout() {
        FailureReason::Timeout
    } else if e.is_connect() {
        FailureReason::ConnectionError
    } else if e.is_builder() {
        FailureReason::InvalidUrl
    } else {
        FailureReason::Other("request_error".into())
    }
}

fn is_tls_error(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        let msg = err.to_string().to_ascii_lowercase();
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("ssl") {
            return true;
        }
        source = err.source();
    }
    false
}
