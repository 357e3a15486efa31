use std::time::Duration;

use fluffer_domain::{FlufferError, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::conversions::status_error;
use crate::errors::InfraError;

/// Longest `Retry-After` we are willing to sleep through inside one request.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// HTTP client with built-in retry and timeout support.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// Server errors and transport failures are retried with exponential
    /// backoff; `429` responses are retried after their `Retry-After` delay.
    /// The final response is returned as-is, whatever its status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            let cloned_builder = builder.try_clone().ok_or_else(|| {
                FlufferError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            let request = cloned_builder
                .build()
                .map_err(|err| FlufferError::from(InfraError::from(err)))?;

            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt = attempt + 1, %method, path = %url.path(), "sending HTTP request");

            let last_attempt = attempt + 1 >= attempts;
            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(
                        attempt = attempt + 1,
                        %method,
                        path = %url.path(),
                        %status,
                        "received HTTP response"
                    );

                    if status == StatusCode::TOO_MANY_REQUESTS && !last_attempt {
                        let delay = retry_after(&response)
                            .unwrap_or_else(|| self.backoff_delay(attempt + 1))
                            .min(MAX_RETRY_AFTER);
                        warn!(
                            path = %url.path(),
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status.is_server_error() && !last_attempt {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) => {
                    debug!(
                        attempt = attempt + 1,
                        %method,
                        path = %url.path(),
                        error = %err,
                        "HTTP request failed"
                    );

                    if !last_attempt && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Err(InfraError::from(err).into());
                }
            }
        }

        Err(FlufferError::Internal(
            "http client exhausted retries without producing a result".into(),
        ))
    }

    /// Send and decode a JSON body, mapping non-success statuses to errors.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = ensure_success(self.send(builder).await?).await?;
        response.json::<T>().await.map_err(|err| InfraError::from(err).into())
    }

    /// Send, mapping non-success statuses to errors and discarding the body.
    pub async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        ensure_success(self.send(builder).await?).await?;
        Ok(())
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Turn a non-success response into the matching domain error.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match body.trim() {
        "" => status.canonical_reason().unwrap_or("unknown status").to_string(),
        text => text.chars().take(200).collect(),
    };
    Err(status_error(status.as_u16(), &detail))
}

fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| FlufferError::from(InfraError::from(err)))?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_request() || err.is_connect()
}
