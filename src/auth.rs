// ===============================
// src/auth.rs
// ===============================
//
// Bearer-token providers. The API client only ever sees the opaque bearer
// string returned by `TokenProvider::bearer`.
//
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

pub const ADMANAGER_SCOPE: &str = "https://www.googleapis.com/auth/admanager";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot read credential file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid service account key: {0}")]
    Key(String),
    #[error("jwt signing failed: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint rejected the assertion ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer(&self) -> Result<String, AuthError>;
}

/// Pre-minted token (GAM_ACCESS_TOKEN).
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Service-account flow: RS256 assertion -> access token, fetched once per
/// invocation.
pub struct ServiceAccountToken {
    http: reqwest::Client,
    key: ServiceAccountKey,
    token: OnceCell<String>,
}

impl ServiceAccountToken {
    pub async fn from_file(http: reqwest::Client, path: PathBuf) -> Result<Self, AuthError> {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| AuthError::Read { path: path.clone(), source })?;
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|e| AuthError::Key(e.to_string()))?;
        Ok(Self { http, key, token: OnceCell::new() })
    }

    fn assertion(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let aud = self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let claims = Claims { iss: &self.key.client_email, scope: ADMANAGER_SCOPE, aud, iat: now, exp: now + 3600 };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn exchange(&self) -> Result<String, AuthError> {
        let uri = self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let body = format!(
            "grant_type={}&assertion={}",
            urlencoding::encode(JWT_BEARER_GRANT),
            urlencoding::encode(&self.assertion()?)
        );
        debug!(%uri, client = %self.key.client_email, "exchanging service account assertion");
        let rsp = self
            .http
            .post(uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }
        Ok(rsp.json::<TokenResponse>().await?.access_token)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountToken {
    async fn bearer(&self) -> Result<String, AuthError> {
        self.token.get_or_try_init(|| self.exchange()).await.cloned()
    }
}
