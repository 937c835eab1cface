//! Rate-limited request executor.
//!
//! Every listing and file request goes through [`RequestExecutor::execute`].
//! A `429 Too Many Requests` answer is handled here by sleeping for the
//! server-issued `Retry-After` delay (plus one unit) and replaying the
//! identical request, so higher layers never see throttling.

use std::time::Duration;

use reqwest::header::{RANGE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, warn};

use super::config::MirrorConfig;
use super::error::RequestError;
use crate::user_agent;

/// HTTP method used by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetch headers and body.
    Get,
    /// Fetch headers only.
    Head,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// Issues requests against one origin and absorbs rate limiting.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    backoff_unit: Duration,
}

impl RequestExecutor {
    /// Builds an executor for the configured origin and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Network`] if the HTTP client cannot be built
    /// (for example when the TLS backend fails to initialize).
    pub fn new(config: &MirrorConfig) -> Result<Self, RequestError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| RequestError::network(config.base_url.clone(), e))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            backoff_unit: config.backoff_unit,
        })
    }

    /// Returns the full URL for an endpoint path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issues one request, replaying it for as long as the server answers 429.
    ///
    /// A `range_start` above zero requests `bytes={range_start}-`; zero asks
    /// for the full resource.
    ///
    /// # Errors
    ///
    /// - [`RequestError::RetryAfter`] when a 429 has no integer `Retry-After`
    /// - [`RequestError::UnexpectedStatus`] for any status other than 200 or 206
    /// - [`RequestError::Network`] / [`RequestError::Timeout`] for transport failures
    #[instrument(skip(self, method), fields(method = method.as_str()))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        range_start: u64,
    ) -> Result<Response, RequestError> {
        let url = self.url_for(path);

        loop {
            let mut request = match method {
                Method::Get => self.client.get(&url),
                Method::Head => self.client.head(&url),
            };
            if range_start > 0 {
                request = request.header(RANGE, format!("bytes={range_start}-"));
            }

            debug!(url = %url, range_start, "issuing request");
            let response = request
                .send()
                .await
                .map_err(|e| RequestError::network(&url, e))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let raw = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let Some(seconds) = raw.as_deref().and_then(parse_retry_after) else {
                    return Err(RequestError::retry_after(&url, raw));
                };

                let delay = backoff_delay(self.backoff_unit, seconds);
                warn!(
                    url = %url,
                    retry_after_secs = seconds,
                    delay_ms = delay.as_millis(),
                    "rate limited, waiting before retry"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
                return Err(RequestError::unexpected_status(&url, status.as_u16()));
            }

            return Ok(response);
        }
    }
}

/// Parses a `Retry-After` value as a non-negative integer count of units.
///
/// HTTP-date values are not accepted.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

/// Sleep applied for a `Retry-After` of `seconds`: one unit more than asked.
#[must_use]
pub fn backoff_delay(unit: Duration, seconds: u64) -> Duration {
    let units = u32::try_from(seconds.saturating_add(1)).unwrap_or(u32::MAX);
    unit.checked_mul(units).unwrap_or(Duration::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::test_support::mock_origin;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn executor_for(uri: &str, unit: Duration) -> RequestExecutor {
        let config = MirrorConfig::new(uri).with_backoff_unit(unit);
        RequestExecutor::new(&config).unwrap()
    }

    #[test]
    fn test_parse_retry_after_integer() {
        assert_eq!(parse_retry_after("2"), Some(2));
        assert_eq!(parse_retry_after(" 30 "), Some(30));
        assert_eq!(parse_retry_after("0"), Some(0));
    }

    #[test]
    fn test_parse_retry_after_rejects_non_integer() {
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("1.5"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_backoff_delay_adds_one_unit() {
        assert_eq!(
            backoff_delay(Duration::from_secs(1), 2),
            Duration::from_secs(3)
        );
        assert_eq!(
            backoff_delay(Duration::from_millis(10), 0),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_backoff_delay_saturates() {
        assert_eq!(
            backoff_delay(Duration::from_secs(u64::MAX / 2), u64::MAX),
            Duration::MAX
        );
    }

    #[test]
    fn test_url_for_joins_base_and_path() {
        let executor = executor_for("http://127.0.0.1:9/", Duration::from_millis(1));
        assert_eq!(executor.url_for("/f/abc"), "http://127.0.0.1:9/f/abc");
    }

    #[tokio::test]
    async fn test_execute_returns_ok_response() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/api/d/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        let response = executor.execute(Method::Get, "/api/d/abc", 0).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_execute_without_offset_sends_no_range_header() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        executor.execute(Method::Get, "/f/abc", 0).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("range").is_none());
    }

    #[tokio::test]
    async fn test_execute_with_offset_requests_open_ended_range() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .and(header("Range", "bytes=5-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"tail".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        let response = executor.execute(Method::Get, "/f/abc", 5).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[tokio::test]
    async fn test_execute_head_uses_head_method() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        executor.execute(Method::Head, "/f/abc", 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_unexpected_status_carries_code() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        let result = executor.execute(Method::Get, "/f/missing", 0).await;
        match result {
            Err(RequestError::UnexpectedStatus { status, url }) => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/f/missing"));
            }
            other => panic!("Expected UnexpectedStatus(404), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_429_sleeps_then_replays_identical_request() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"rest".to_vec()))
            .mount(&mock_server)
            .await;

        let unit = Duration::from_millis(20);
        let executor = executor_for(&mock_server.uri(), unit);

        let started = Instant::now();
        let response = executor.execute(Method::Get, "/f/abc", 7).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert!(
            elapsed >= unit * 3,
            "expected at least 3 units of backoff, waited {elapsed:?}"
        );

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, requests[1].url);
        assert_eq!(requests[0].method, requests[1].method);
        assert_eq!(
            requests[0].headers.get("range"),
            requests[1].headers.get("range")
        );
        assert_eq!(
            requests[1].headers.get("range").unwrap().to_str().unwrap(),
            "bytes=7-"
        );
    }

    #[tokio::test]
    async fn test_execute_429_repeats_until_server_clears() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/api/d/abc"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(3)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/d/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        executor.execute(Method::Get, "/api/d/abc", 0).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 4);
    }

    #[tokio::test]
    async fn test_execute_429_without_header_fails_without_retry() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        let result = executor.execute(Method::Get, "/f/abc", 0).await;

        assert!(
            matches!(result, Err(RequestError::RetryAfter { value: None, .. })),
            "Expected RetryAfter error, got: {result:?}"
        );
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1, "must not retry without Retry-After");
    }

    #[tokio::test]
    async fn test_execute_429_with_unparsable_header_is_fatal() {
        let Some(mock_server) = mock_origin().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/f/abc"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "later"))
            .mount(&mock_server)
            .await;

        let executor = executor_for(&mock_server.uri(), Duration::from_millis(1));
        let result = executor.execute(Method::Get, "/f/abc", 0).await;

        match result {
            Err(error @ RequestError::RetryAfter { .. }) => {
                assert!(error.is_fatal());
                assert!(error.to_string().contains("later"));
            }
            other => panic!("Expected RetryAfter error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_connection_refused_is_network_error() {
        // Port 9 (discard) is almost never listening locally.
        let executor = executor_for("http://127.0.0.1:9", Duration::from_millis(1));
        let result = executor.execute(Method::Get, "/api/d/abc", 0).await;
        assert!(matches!(
            result,
            Err(RequestError::Network { .. } | RequestError::Timeout { .. })
        ));
    }
}
