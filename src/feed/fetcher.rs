use crate::feed::parser::{parse_feed, ParseError, RawEntry};
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that can occur while retrieving and parsing one feed.
///
/// Every variant is scoped to a single feed: the pipeline records it in that
/// feed's result and moves on to the next feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body read exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Document retrieved but not a feed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl FetchError {
    pub fn is_parse(&self) -> bool {
        matches!(self, FetchError::Parse(_))
    }
}

/// Builds the shared HTTP client for feed retrieval.
///
/// Follows at most 3 redirects and rejects redirect loops.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Retrieves feed documents over HTTP and parses them into [`RawEntry`] values.
///
/// The fetcher never caps or filters; it returns whatever the remote feed
/// publishes, newest first.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    backoff: Duration,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Bound on one retrieval attempt, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay for retry backoff; attempt `n` waits `backoff * 2^n`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetches `url` and parses it as the feed called `feed_name`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - an attempt exceeded the configured timeout
    /// - [`FetchError::Network`] - connection or TLS errors
    /// - [`FetchError::HttpStatus`] - non-2xx response (5xx after retries)
    /// - [`FetchError::RateLimited`] - 429 response after max retries
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    /// - [`FetchError::Parse`] - the body is not a feed document
    pub async fn fetch(&self, feed_name: &str, url: &str) -> Result<Vec<RawEntry>, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        let entries = parse_feed(&bytes, feed_name)?;
        tracing::debug!(feed = %feed_name, entries = entries.len(), "Parsed feed");
        Ok(entries)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let attempt = tokio::time::timeout(self.timeout, self.fetch_once(url))
                .await
                .map_err(|_| FetchError::Timeout(self.timeout))?;

            let retryable = match attempt {
                Ok(bytes) => return Ok(bytes),
                Err(Attempt::Retry(e)) => e,
                Err(Attempt::Fail(e)) => return Err(e),
            };

            if retry_count >= MAX_RETRIES {
                return Err(match retryable {
                    FetchError::HttpStatus(429) => FetchError::RateLimited(MAX_RETRIES),
                    other => other,
                });
            }

            let delay = self.backoff.saturating_mul(2u32.pow(retry_count));
            tracing::warn!(
                url = %url,
                error = %retryable,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Feed request failed, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, Attempt> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Fail(FetchError::Network(e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Attempt::Retry(FetchError::HttpStatus(status.as_u16())));
        }
        if !status.is_success() {
            return Err(Attempt::Fail(FetchError::HttpStatus(status.as_u16())));
        }

        match read_limited_bytes(response, MAX_FEED_SIZE).await {
            Ok(bytes) => Ok(bytes),
            Err(e @ FetchError::IncompleteResponse { .. }) => Err(Attempt::Retry(e)),
            Err(e) => Err(Attempt::Fail(e)),
        }
    }
}

/// Outcome of a single failed attempt.
enum Attempt {
    Retry(FetchError),
    Fail(FetchError),
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
