//! OAuth2 refresh-token authentication for Cloud Drive.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::Client;
use tokio::sync::RwLock;

use crate::error::{DriveError, Result};
use crate::models::{OAuthCredentials, TokenResponse};

/// Login with Amazon token endpoint.
const TOKEN_URI: &str = "https://api.amazon.com/auth/o2/token";

/// Refresh this long before the token actually expires.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<SystemTime>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > SystemTime::now() + EXPIRY_BUFFER,
            None => true,
        }
    }
}

/// Hands out bearer tokens, refreshing them when they are about to expire.
#[derive(Clone)]
pub struct Authenticator {
    credentials: Option<Arc<RwLock<OAuthCredentials>>>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from an OAuth2 credentials JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: OAuthCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    /// Create a new authenticator from credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials: Some(Arc::new(RwLock::new(credentials))),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an authenticator that always hands out `access_token`.
    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        let token = CachedToken {
            access_token: access_token.into(),
            expires_at: None,
        };
        Self {
            credentials: None,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(Some(token))),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let new_token = self.refresh_token().await?;
        *cached = Some(new_token.clone());

        Ok(new_token.access_token)
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh_token(&self) -> Result<CachedToken> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            DriveError::TokenRefresh("no refresh credentials configured".to_string())
        })?;
        let mut credentials = credentials.write().await;

        tracing::debug!("refreshing access token");

        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI).to_string();
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self.client.post(&token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefresh(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await?;
        let token_response: TokenResponse = serde_json::from_slice(&body)?;

        if !token_response.token_type.eq_ignore_ascii_case("bearer") {
            return Err(DriveError::TokenRefresh(format!(
                "unexpected token type {}",
                token_response.token_type
            )));
        }

        // The server may rotate the refresh token.
        if let Some(refresh_token) = token_response.refresh_token {
            credentials.refresh_token = refresh_token;
        }

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: Some(expires_at),
        })
    }
}
