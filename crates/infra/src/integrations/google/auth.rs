//! Access tokens from a long-lived OAuth refresh token.

use std::time::{Duration, Instant};

use fluffer_domain::{CalendarConfig, FlufferError, Result};
use reqwest::Method;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::TokenResponse;
use crate::http::HttpClient;

/// Refresh this long before the token actually expires.
const REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens, refreshing them on demand.
pub struct GoogleTokenProvider {
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleTokenProvider {
    pub fn new(config: &CalendarConfig, http: HttpClient) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Current access token, exchanging the refresh token when the cached one
    /// is missing or about to expire.
    ///
    /// # Errors
    /// Returns `FlufferError::Auth` when the token endpoint rejects the
    /// refresh token.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_THRESHOLD {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let lifetime = Duration::from_secs(fresh.expires_in.max(0) as u64);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        info!(expires_in_secs = lifetime.as_secs(), "Refreshed calendar access token");
        Ok(fresh.access_token)
    }

    /// Forget the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        debug!("Invalidating cached calendar access token");
        *self.cached.lock().await = None;
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let request = self.http.request(Method::POST, &self.token_url).form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]);

        self.http.send_json::<TokenResponse>(request).await.map_err(|err| match err {
            FlufferError::InvalidInput(msg) | FlufferError::Auth(msg) => {
                FlufferError::Auth(format!("Token refresh failed: {msg}"))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> GoogleTokenProvider {
        let config = CalendarConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            refresh_token: "refresh-me".into(),
            token_url: format!("{}/token", server.uri()),
            ..CalendarConfig::default()
        };
        let http = HttpClient::builder().max_attempts(1).build().expect("http client");
        GoogleTokenProvider::new(&config, http)
    }

    #[tokio::test]
    async fn caches_token_until_near_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.first",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = provider(&server);
        assert_eq!(auth.access_token().await.unwrap(), "ya29.first");
        assert_eq!(auth.access_token().await.unwrap(), "ya29.first");
    }

    #[tokio::test]
    async fn short_lived_token_is_refreshed_every_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok", "expires_in": 60})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = provider(&server);
        auth.access_token().await.unwrap();
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok", "expires_in": 3600})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = provider(&server);
        auth.access_token().await.unwrap();
        auth.invalidate().await;
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        match provider(&server).access_token().await {
            Err(FlufferError::Auth(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }
}
