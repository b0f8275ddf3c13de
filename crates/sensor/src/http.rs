//! HTTP sample source for the BMS board.
//!
//! The board serves a single JSON document (`{"s": soc, "c": amps}`) on a
//! fixed path. Each request is bounded by a client-side timeout; transient
//! failures are retried a fixed number of times with exponential backoff
//! before the cycle is reported as failed.

use crate::source::{Sample, SampleSource, SensorError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Statuses worth asking again for; the board is usually just busy.
const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// How many times to re-ask and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self { max_retries, backoff_base }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based): base, 2·base, 4·base, …
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Polls the board over HTTP.
pub struct HttpSampleSource {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl HttpSampleSource {
    pub fn new(url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, SensorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SensorError::Transport(e.to_string()))?;
        Ok(Self { client, url: url.into(), retry })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_with_retry(&self) -> Result<Sample, SensorError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(sample) => return Ok(sample),
                Err(e) if is_transient(&e) && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "sensor fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self) -> Result<Sample, SensorError> {
        let resp = self
            .client
            .get(&self.url)
            .header(reqwest::header::CONNECTION, "close")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SensorError::BadStatus(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        Sample::from_json(&body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SensorError {
    if e.is_timeout() {
        SensorError::Timeout
    } else {
        SensorError::Transport(e.to_string())
    }
}

/// Malformed bodies and client errors won't fix themselves on a retry.
fn is_transient(e: &SensorError) -> bool {
    match e {
        SensorError::Transport(_) | SensorError::Timeout => true,
        SensorError::BadStatus(code) => RETRY_STATUSES.contains(code),
        SensorError::Malformed(_) => false,
    }
}

impl SampleSource for HttpSampleSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Sample, SensorError>> + Send + '_>> {
        Box::pin(self.fetch_with_retry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: String, retry: RetryPolicy) -> HttpSampleSource {
        HttpSampleSource::new(url, Duration::from_secs(2), retry).unwrap()
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay(1), Duration::from_secs(1));
        assert_eq!(p.delay(2), Duration::from_secs(2));
        assert_eq!(p.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&SensorError::Timeout));
        assert!(is_transient(&SensorError::BadStatus(503)));
        assert!(!is_transient(&SensorError::BadStatus(404)));
        assert!(!is_transient(&SensorError::Malformed("x".into())));
    }

    #[tokio::test]
    async fn fetches_sample() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"s": 42, "c": -1.25}"#)
            .create_async()
            .await;

        let src = source(format!("{}/data", server.url()), RetryPolicy::none());
        let sample = src.fetch().await.unwrap();
        assert_eq!(sample, Sample::new(42, -1.25));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/data")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let src = source(
            format!("{}/data", server.url()),
            RetryPolicy::new(2, Duration::from_millis(1)),
        );
        assert!(matches!(src.fetch().await, Err(SensorError::BadStatus(503))));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/data")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let src = source(
            format!("{}/data", server.url()),
            RetryPolicy::new(3, Duration::from_millis(1)),
        );
        assert!(matches!(src.fetch().await, Err(SensorError::BadStatus(404))));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data")
            .with_status(200)
            .with_body(r#"{"c": -0.4}"#)
            .create_async()
            .await;

        let src = source(format!("{}/data", server.url()), RetryPolicy::none());
        assert!(matches!(src.fetch().await, Err(SensorError::Malformed(_))));
    }

    #[tokio::test]
    async fn unreachable_board_is_transport_failure() {
        let src = source("http://127.0.0.1:1/data".into(), RetryPolicy::none());
        assert!(matches!(
            src.fetch().await,
            Err(SensorError::Transport(_)) | Err(SensorError::Timeout)
        ));
    }
}
