use std::time::{Duration, Instant};

use {
    herald_config::TeamsConfig,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::debug,
};

use crate::{Error, Result};

#[derive(Clone)]
pub struct CachedAccessToken {
    pub token: Secret<String>,
    pub expires_at: Instant,
}

impl CachedAccessToken {
    fn is_valid(&self) -> bool {
        let refresh_skew = Duration::from_secs(60);
        self.expires_at > Instant::now() + refresh_skew
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Client-credential token source for the Bot Framework connector.
///
/// The token is shared by every concurrent dispatch; the lock is held only
/// while reading or replacing the cached value, never across the HTTP call.
#[derive(Default)]
pub struct TokenCache {
    cached: Mutex<Option<CachedAccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        client: &reqwest::Client,
        config: &TeamsConfig,
    ) -> Result<Secret<String>> {
        {
            let guard = self.cached.lock().await;
            if let Some(token) = guard.as_ref()
                && token.is_valid()
            {
                return Ok(token.token.clone());
            }
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", config.app_id.as_str()),
            ("client_secret", config.app_password.expose_secret().as_str()),
            ("scope", config.oauth_scope.as_str()),
        ];

        let resp = client
            .post(config.token_endpoint())
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Token { status, body });
        }

        let body: TokenResponse = resp.json().await?;
        let ttl = body.expires_in.unwrap_or(3600).max(120);
        let cached = CachedAccessToken {
            token: Secret::new(body.access_token),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        };
        let token = cached.token.clone();
        debug!(ttl, "acquired Bot Framework access token");

        *self.cached.lock().await = Some(cached);
        Ok(token)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::Server) -> TeamsConfig {
        TeamsConfig {
            app_id: "app".into(),
            app_password: Secret::new("pw".into()),
            token_url: Some(format!("{}/token", server.url())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn token_is_cached_between_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "client_credentials".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-1","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let cache = TokenCache::new();
        let client = reqwest::Client::new();
        let config = config_for(&server);
        let first = cache.get(&client, &config).await.unwrap();
        let second = cache.get(&client, &config).await.unwrap();

        assert_eq!(first.expose_secret(), "tok-1");
        assert_eq!(second.expose_secret(), "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn short_ttl_is_clamped_to_floor() {
        let mut server = mockito::Server::new_async().await;
        // 30s is raised to the 120s floor, which outlives the 60s refresh skew.
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok","expires_in":30}"#)
            .expect(1)
            .create_async()
            .await;

        let cache = TokenCache::new();
        let client = reqwest::Client::new();
        let config = config_for(&server);
        cache.get(&client, &config).await.unwrap();
        cache.get(&client, &config).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body("bad client secret")
            .create_async()
            .await;

        let cache = TokenCache::new();
        let err = cache
            .get(&reqwest::Client::new(), &config_for(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token { status: 401, .. }), "{err}");
    }
}
