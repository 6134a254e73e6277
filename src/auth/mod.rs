//! Bearer tokens for Drive requests.
//!
//! [`OAuth2Provider`] redeems a user's refresh token. [`ServiceAccountProvider`]
//! signs an RS256 assertion with a service-account key, usually read from the
//! JSON key file the cloud console hands out. Both keep the last token and
//! go back to the token endpoint only when it is within five minutes of
//! expiring.
//!
//! ```no_run
//! use integrations_drive_browser::auth::{AuthProvider, ServiceAccountProvider, scopes};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ServiceAccountProvider::from_json_file(
//!     "credentials.json",
//!     vec![scopes::DRIVE.to_string()],
//! )
//! .await?;
//!
//! let token = provider.get_access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::errors::{AuthenticationError, BrowserResult, ConfigurationError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Google's OAuth2 token endpoint.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens closer than this to expiry are replaced before use.
pub const TOKEN_EXPIRY_BUFFER_SECONDS: i64 = 300;

/// Validity requested for service-account assertions.
pub const JWT_LIFETIME_SECONDS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Drive scopes.
pub mod scopes {
    /// Read and write every file the account can see.
    pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";

    /// Browse and download only.
    pub const DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";
}

/// Supplies access tokens to the request executor.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// A token valid for at least the refresh buffer, fetching one if needed.
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError>;

    /// Fetches a new token regardless of the cached one.
    async fn refresh_token(&self) -> Result<AccessToken, AuthenticationError>;

    /// True when no usable token is cached.
    fn is_expired(&self) -> bool;
}

/// A bearer token and when it stops working.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Opaque token value.
    pub token: SecretString,
    /// Usually `Bearer`.
    pub token_type: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// Scopes the server granted.
    pub scopes: Vec<String>,
}

impl AccessToken {
    /// Wraps a token value.
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token: SecretString::new(token.into()),
            token_type: token_type.into(),
            expires_at,
            scopes,
        }
    }

    /// Past its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Inside the refresh buffer.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(TOKEN_EXPIRY_BUFFER_SECONDS) >= self.expires_at
    }

    /// `<type> <token>`, as sent in `Authorization`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token.expose_secret())
    }
}

/// The last token a provider obtained.
#[derive(Default)]
struct TokenCache {
    current: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    async fn fresh(&self) -> Option<AccessToken> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| !token.needs_refresh())
            .cloned()
    }

    async fn store(&self, token: AccessToken) -> AccessToken {
        *self.current.write().await = Some(token.clone());
        token
    }

    /// Reports expired when the slot is empty; a refresh in progress counts as
    /// not expired.
    fn is_expired(&self) -> bool {
        match self.current.try_read() {
            Ok(current) => current.as_ref().map_or(true, AccessToken::is_expired),
            Err(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: i64,
    scope: Option<String>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

/// POSTs a grant to the token endpoint and reads the token out of the reply.
/// `requested` stands in for the granted scopes when the reply omits them.
async fn redeem<G: Serialize + ?Sized>(
    http: &Client,
    token_url: &str,
    grant: &G,
    requested: &[String],
) -> Result<AccessToken, AuthenticationError> {
    let response = http
        .post(token_url)
        .form(grant)
        .send()
        .await
        .map_err(|e| AuthenticationError::RefreshFailed(format!("token endpoint unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "token endpoint refused grant");
        return Err(AuthenticationError::RefreshFailed(format!(
            "token endpoint answered {}: {}",
            status, detail
        )));
    }

    let reply: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthenticationError::RefreshFailed(format!("unreadable token reply: {}", e)))?;

    let scopes = match reply.scope {
        Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
        None => requested.to_vec(),
    };

    Ok(AccessToken::new(
        reply.access_token,
        reply.token_type,
        Utc::now() + Duration::seconds(reply.expires_in),
        scopes,
    ))
}

/// Redeems a stored refresh token.
pub struct OAuth2Provider {
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    token_url: String,
    cache: TokenCache,
    http: Client,
}

impl OAuth2Provider {
    /// From an installed-app client and a user's refresh token.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        refresh_token: SecretString,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            refresh_token,
            token_url: TOKEN_URL.to_string(),
            cache: TokenCache::default(),
            http: Client::new(),
        }
    }

    /// Same as [`new`](Self::new) with plain strings.
    pub fn new_with_strings(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self::new(
            client_id,
            SecretString::new(client_secret.into()),
            SecretString::new(refresh_token.into()),
        )
    }

    /// Points at another token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn redeem_refresh_token(&self) -> Result<AccessToken, AuthenticationError> {
        debug!(token_url = %self.token_url, "redeeming refresh token");
        let grant = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("refresh_token", self.refresh_token.expose_secret().as_str()),
        ];
        redeem(&self.http, &self.token_url, &grant, &[]).await
    }
}

#[async_trait]
impl AuthProvider for OAuth2Provider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError> {
        match self.cache.fresh().await {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    async fn refresh_token(&self) -> Result<AccessToken, AuthenticationError> {
        let token = self.redeem_refresh_token().await?;
        Ok(self.cache.store(token).await)
    }

    fn is_expired(&self) -> bool {
        self.cache.is_expired()
    }
}

/// The parts of a service-account JSON key the provider needs.
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

/// Exchanges signed JWT assertions for tokens.
pub struct ServiceAccountProvider {
    email: String,
    private_key: SecretString,
    private_key_id: Option<String>,
    scopes: Vec<String>,
    subject: Option<String>,
    token_url: String,
    cache: TokenCache,
    http: Client,
}

impl ServiceAccountProvider {
    /// From an account email and its PEM private key.
    pub fn new(email: impl Into<String>, private_key: SecretString, scopes: Vec<String>) -> Self {
        Self {
            email: email.into(),
            private_key,
            private_key_id: None,
            scopes,
            subject: None,
            token_url: TOKEN_URL.to_string(),
            cache: TokenCache::default(),
            http: Client::new(),
        }
    }

    /// Same as [`new`](Self::new) with a plain string key.
    pub fn new_with_string(
        email: impl Into<String>,
        private_key: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self::new(email, SecretString::new(private_key.into()), scopes)
    }

    /// Parses a JSON key. Keys of any type other than `service_account` are
    /// rejected.
    pub fn from_json(json: &str, scopes: Vec<String>) -> BrowserResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            ConfigurationError::InvalidCredentials(format!("malformed service account key: {}", e))
        })?;

        match key.kind.as_deref() {
            None | Some("service_account") => {}
            Some(other) => {
                return Err(ConfigurationError::InvalidCredentials(format!(
                    "'{}' key where a service_account key was expected",
                    other
                ))
                .into())
            }
        }

        Ok(Self {
            private_key_id: key.private_key_id,
            token_url: key.token_uri.unwrap_or_else(|| TOKEN_URL.to_string()),
            ..Self::new_with_string(key.client_email, key.private_key, scopes)
        })
    }

    /// Reads and parses a JSON key file.
    pub async fn from_json_file(path: impl AsRef<Path>, scopes: Vec<String>) -> BrowserResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConfigurationError::MissingCredentials(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&json, scopes)
    }

    /// Acts on behalf of `subject` through domain-wide delegation.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Points at another token endpoint; also the assertion audience.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// The account's email.
    pub fn service_account_email(&self) -> &str {
        &self.email
    }

    fn sign_assertion(&self) -> Result<String, AuthenticationError> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.email,
            scope: self.scopes.join(" "),
            aud: &self.token_url,
            iat,
            exp: iat + JWT_LIFETIME_SECONDS,
            sub: self.subject.as_deref(),
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| AuthenticationError::JwtEncodingError(format!("private key: {}", e)))?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| AuthenticationError::JwtEncodingError(e.to_string()))
    }
}

#[async_trait]
impl AuthProvider for ServiceAccountProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError> {
        match self.cache.fresh().await {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    async fn refresh_token(&self) -> Result<AccessToken, AuthenticationError> {
        let assertion = self.sign_assertion()?;
        debug!(account = %self.email, "exchanging service account assertion");
        let grant = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        let token = redeem(&self.http, &self.token_url, &grant, &self.scopes).await?;
        Ok(self.cache.store(token).await)
    }

    fn is_expired(&self) -> bool {
        self.cache.is_expired()
    }
}
