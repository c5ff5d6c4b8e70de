//! Authenticated request execution with a concurrency gate and retry/backoff.
//!
//! Every request goes through [`RequestExecutor::execute`]:
//! - fails with `NotConfigured` before any I/O when credentials are missing
//! - waits for one of `max_in_flight` permits (shared by all clones) and
//!   keeps it through any backoff sleep
//! - classifies the response: 200 succeeds, 429 / 5xx / network faults are
//!   retried with exponential backoff, anything else fails immediately
//! - gives up with `UpstreamExhausted` after `max_attempts`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, error, instrument, warn};

use pocsync_shared::{CallsClientConfig, Credentials, PocsyncError, Result, RetryPolicy};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("pocsync/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt carried in error messages.
const ERROR_BODY_EXCERPT: usize = 300;

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Waits out a backoff delay.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration) -> SleepFuture;
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(delay))
    }
}

// ---------------------------------------------------------------------------
// RequestExecutor
// ---------------------------------------------------------------------------

/// Outcome of one attempt.
enum Attempt {
    Success(String),
    Retry { delay: Duration, reason: String },
    Fail(PocsyncError),
}

/// Issues authenticated requests against the calls API.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    /// `None` when credentials are not configured.
    auth_header: Option<HeaderValue>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestExecutor {
    /// Create an executor from resolved configuration.
    pub fn new(config: &CallsClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PocsyncError::Network(format!("failed to build HTTP client: {e}")))?;

        let auth_header = config
            .credentials
            .as_ref()
            .map(basic_auth_header)
            .transpose()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            max_in_flight: config.max_in_flight,
            retry: config.retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Number of requests currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Send `body` (as JSON) to `path` and decode the 200 response as `T`.
    #[instrument(skip_all, fields(%method, path))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let auth = self.auth_header.as_ref().ok_or_else(|| {
            PocsyncError::not_configured("access key and access key secret are required")
        })?;

        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::from("no attempt completed");

        for attempt in 0..self.retry.max_attempts {
            // Held through the backoff sleep below.
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| PocsyncError::Network("request gate closed".into()))?;
            debug!(attempt = attempt + 1, in_flight = self.in_flight(), "sending request");

            match self.attempt(&method, &url, auth, body, attempt).await {
                Attempt::Success(text) => return decode(&method, path, &text),
                Attempt::Fail(err) => {
                    error!(error = %err, "calls API request failed");
                    return Err(err);
                }
                Attempt::Retry { delay, reason } => {
                    warn!(
                        reason = %reason,
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        "retrying calls API request"
                    );
                    last_error = reason;
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        error!(
            attempts = self.retry.max_attempts,
            last_error = %last_error,
            "calls API retries exhausted"
        );
        Err(PocsyncError::UpstreamExhausted {
            attempts: self.retry.max_attempts,
            last_error,
        })
    }

    /// One request/response exchange, classified.
    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        auth: &HeaderValue,
        body: Option<&serde_json::Value>,
        attempt: u32,
    ) -> Attempt {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, auth.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Fail(PocsyncError::Network(format!("invalid request: {e}")));
            }
            Err(e) => {
                return Attempt::Retry {
                    delay: self.retry.backoff(attempt),
                    reason: format!("network error: {e}"),
                };
            }
        };

        let status = response.status();

        if status == StatusCode::OK {
            return match response.text().await {
                Ok(text) => Attempt::Success(text),
                Err(e) => Attempt::Retry {
                    delay: self.retry.backoff(attempt),
                    reason: format!("body read failed: {e}"),
                },
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let backoff = self.retry.backoff(attempt);
            let delay = retry_after(response.headers()).map_or(backoff, |ra| ra.max(backoff));
            return Attempt::Retry {
                delay,
                reason: format!("HTTP {status}"),
            };
        }

        if status.is_server_error() {
            return Attempt::Retry {
                delay: self.retry.backoff(attempt),
                reason: format!("HTTP {status}"),
            };
        }

        let text = response.text().await.unwrap_or_default();
        Attempt::Fail(PocsyncError::Upstream {
            status: status.as_u16(),
            message: excerpt(&text),
        })
    }
}

/// `Authorization: Basic base64(key:secret)`, marked sensitive.
fn basic_auth_header(credentials: &Credentials) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!(
        "{}:{}",
        credentials.access_key, credentials.access_key_secret
    ));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .map_err(|e| PocsyncError::config(format!("invalid credentials: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// `Retry-After` in (possibly fractional) seconds. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn decode<T: DeserializeOwned>(method: &Method, path: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        PocsyncError::parse(format!(
            "{method} {path}: unexpected response body ({e}): {}",
            excerpt(text)
        ))
    })
}

fn excerpt(text: &str) -> String {
    text.chars().take(ERROR_BODY_EXCERPT).collect()
}
