//! Resilient fetch: one request, parsed body, fixed retry policy.
//!
//! Failures never propagate out of [`ResilientFetch::fetch`]. Callers get
//! `None` (or an empty fallback body) and the reason goes to the log.
//!
//! ```text
//! Attempting ──2xx──────────────► decoded body
//!     │ 429                    ┌► Backoff(Retry-After) ─► Attempting
//!     │ 5xx / transport error  ├► Backoff(3s, once)    ─► Attempting
//!     └ other 4xx / retry spent└► GivenUp             ─► None
//! ```

pub mod error;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub use error::FetchError;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

pub const DEFAULT_RETRY_AFTER_SECS: u64 = 2;
pub const SERVER_ERROR_DELAY_MS: u64 = 3000;

/// Retry-After values below this are read as seconds, the rest as milliseconds.
const RETRY_AFTER_SECONDS_CEILING: u64 = 60;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// `None` keeps retrying as long as the server keeps sending 429.
    pub rate_limit_retries: Option<u32>,
    pub default_retry_after: u64,
    pub server_error_retries: u32,
    pub server_error_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_retries: None,
            default_retry_after: DEFAULT_RETRY_AFTER_SECS,
            server_error_retries: 1,
            server_error_delay_ms: SERVER_ERROR_DELAY_MS,
        }
    }
}

/// Converts a `Retry-After` header into a sleep.
///
/// Small values are seconds, values of 60 and above are taken as
/// milliseconds. Unparseable or absent headers fall back to `default_secs`.
pub fn retry_after_delay(header: Option<&str>, default_secs: u64) -> Duration {
    let value = header
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default_secs);
    if value < RETRY_AFTER_SECONDS_CEILING {
        Duration::from_millis(value * 1000)
    } else {
        Duration::from_millis(value)
    }
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffReason {
    RateLimited,
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Attempting,
    Backoff {
        delay: Duration,
        reason: BackoffReason,
    },
    GivenUp,
}

pub struct ResilientFetch {
    transport: Box<dyn HttpTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
    requests: AtomicU64,
}

impl ResilientFetch {
    pub fn new(transport: Box<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, Box::new(ThreadSleeper), policy)
    }

    pub fn with_sleeper(
        transport: Box<dyn HttpTransport>,
        sleeper: Box<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            requests: AtomicU64::new(0),
        }
    }

    /// Number of transport calls made so far, retries included.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn fetch(&self, request: &HttpRequest) -> Option<Value> {
        let mut rate_limited = 0u32;
        let mut server_retries = 0u32;
        let mut step = Step::Attempting;

        loop {
            step = match step {
                Step::Attempting => {
                    self.requests.fetch_add(1, Ordering::Relaxed);
                    match self.transport.send(request) {
                        Ok(response) => match response.error_for_status() {
                            Ok(()) => return Some(Self::decode(&response)),
                            Err(e) => {
                                log::warn!(
                                    "Request failed. URL: {} {} Content: {}",
                                    request.url,
                                    e,
                                    response.body
                                );
                                self.after_status(&response, &mut rate_limited, &mut server_retries)
                            }
                        },
                        Err(e) => {
                            log::warn!("Request failed. URL: {} Error: {}", request.url, e);
                            self.after_server_error(&mut server_retries)
                        }
                    }
                }
                Step::Backoff { delay, reason } => {
                    log::warn!(
                        "{:?} on {}, pausing {}ms before retry",
                        reason,
                        request.url,
                        delay.as_millis()
                    );
                    self.sleeper.sleep(delay);
                    Step::Attempting
                }
                Step::GivenUp => {
                    log::error!("Giving up on {}", request.url);
                    return None;
                }
            };
        }
    }

    fn after_status(
        &self,
        response: &HttpResponse,
        rate_limited: &mut u32,
        server_retries: &mut u32,
    ) -> Step {
        match response.status {
            // A 429 during the server-error retry is a second failure.
            429 if *server_retries == 0 => {
                if let Some(max) = self.policy.rate_limit_retries {
                    if *rate_limited >= max {
                        return Step::GivenUp;
                    }
                }
                *rate_limited += 1;
                Step::Backoff {
                    delay: retry_after_delay(
                        response.header("retry-after"),
                        self.policy.default_retry_after,
                    ),
                    reason: BackoffReason::RateLimited,
                }
            }
            status if status >= 500 => self.after_server_error(server_retries),
            _ => Step::GivenUp,
        }
    }

    fn after_server_error(&self, server_retries: &mut u32) -> Step {
        if *server_retries >= self.policy.server_error_retries {
            return Step::GivenUp;
        }
        *server_retries += 1;
        Step::Backoff {
            delay: Duration::from_millis(self.policy.server_error_delay_ms),
            reason: BackoffReason::ServerError,
        }
    }

    fn decode(response: &HttpResponse) -> Value {
        let content_type = response.header("content-type").unwrap_or_default();
        if !content_type.contains("json") {
            return Value::String(response.body.clone());
        }
        if response.body.is_empty() {
            return json!({ "msg": "empty response body", "status": response.status });
        }
        match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) => {
                log::error!("{}: {}", FetchError::from(e), response.body);
                Value::Array(Vec::new())
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const URL: &str = "https://api.test/v1/me";

    #[test]
    fn test_success_parses_json() {
        let transport = ScriptedTransport::new();
        transport.push_json(URL, json!({ "id": "me" }));
        let (fetch, sleeper) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!({ "id": "me" })));
        assert_eq!(fetch.request_count(), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_falls_back_to_empty() {
        let transport = ScriptedTransport::new();
        transport.push(
            URL,
            HttpResponse::new(200, "{not json").with_header("Content-Type", "application/json"),
        );
        let (fetch, _) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!([])));
    }

    #[test]
    fn test_empty_json_body_reports_status() {
        let transport = ScriptedTransport::new();
        transport.push(
            URL,
            HttpResponse::new(204, "").with_header("Content-Type", "application/json"),
        );
        let (fetch, _) = fetcher(&transport);

        let body = fetch.fetch(&HttpRequest::get(URL)).unwrap();
        assert_eq!(body["status"], 204);
    }

    #[test]
    fn test_non_json_body_returned_as_text() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(200, "plain").with_header("Content-Type", "text/plain"));
        let (fetch, _) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!("plain")));
    }

    #[test]
    fn test_rate_limit_honours_retry_after() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(429, "").with_header("Retry-After", "5"));
        transport.push(URL, HttpResponse::new(429, "").with_header("Retry-After", "120"));
        transport.push(URL, HttpResponse::new(429, ""));
        transport.push_json(URL, json!({ "ok": true }));
        let (fetch, sleeper) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!({ "ok": true })));
        assert_eq!(fetch.request_count(), 4);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![
                Duration::from_millis(5000),
                Duration::from_millis(120),
                Duration::from_millis(2000),
            ]
        );
    }

    #[test]
    fn test_rate_limit_cap_gives_up() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push(URL, HttpResponse::new(429, "").with_header("Retry-After", "1"));
        }
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            rate_limit_retries: Some(2),
            ..RetryPolicy::default()
        };
        let fetch =
            ResilientFetch::with_sleeper(Box::new(transport.clone()), Box::new(sleeper), policy);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), None);
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn test_server_error_retried_once() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(503, "busy"));
        transport.push(URL, HttpResponse::new(502, "still busy"));
        transport.push_json(URL, json!({ "never": "reached" }));
        let (fetch, sleeper) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), None);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(*sleeper.sleeps.lock().unwrap(), vec![Duration::from_millis(3000)]);
    }

    #[test]
    fn test_server_error_then_success() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(500, "oops"));
        transport.push_json(URL, json!([1, 2]));
        let (fetch, _) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!([1, 2])));
        assert_eq!(fetch.request_count(), 2);
    }

    #[test]
    fn test_rate_limit_after_server_error_is_final() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(500, "oops"));
        transport.push(URL, HttpResponse::new(429, ""));
        let (fetch, _) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), None);
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_client_error_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push(URL, HttpResponse::new(404, "missing"));
        let (fetch, sleeper) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), None);
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_error_retried_once() {
        let transport = ScriptedTransport::new();
        transport.push_error(URL, "connection reset");
        transport.push_json(URL, json!({ "ok": 1 }));
        let (fetch, _) = fetcher(&transport);

        assert_eq!(fetch.fetch(&HttpRequest::get(URL)), Some(json!({ "ok": 1 })));
    }

    #[test]
    fn test_retry_after_units() {
        assert_eq!(retry_after_delay(Some("1"), 2), Duration::from_millis(1000));
        assert_eq!(retry_after_delay(Some("59"), 2), Duration::from_millis(59_000));
        assert_eq!(retry_after_delay(Some("60"), 2), Duration::from_millis(60));
        assert_eq!(retry_after_delay(Some("soon"), 2), Duration::from_millis(2000));
        assert_eq!(retry_after_delay(None, 2), Duration::from_millis(2000));
    }
}
