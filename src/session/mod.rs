//! Server-side sessions carried by a signed cookie.
//!
//! The client only holds an opaque token (signed with the configured secret);
//! the identity payload lives in a [`SessionStore`]. A session is either
//! absent or active:
//!
//! - [`SessionManager::create`] issues a fresh token on login, dropping the
//!   session the request already carried, if any.
//! - [`SessionManager::read`] returns the payload, or an empty payload when
//!   the cookie is missing, mis-signed, unknown, or expired. An empty payload
//!   is the only "not logged in" signal.
//! - [`SessionManager::invalidate`] removes the record; the caller pairs it
//!   with [`SessionManager::clear_cookie`].
//!
//! Payloads are never mutated after creation.

mod cookie;
mod store;
mod token;

pub use cookie::valid_cookie_name;
pub use store::{MemorySessionStore, PgSessionStore, SessionRecord, SessionStore};
pub use token::SessionToken;

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use crate::store::User;

pub const USERNAME_KEY: &str = "username";
pub const FIRST_NAME_KEY: &str = "first_name";
pub const LAST_NAME_KEY: &str = "last_name";

const DEFAULT_COOKIE_NAME: &str = "sesame_session";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
/// Longest accepted session TTL: ten years.
pub const MAX_SESSION_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const MAX_TOKEN_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("session token already exists")]
    Collision,

    #[error("failed to generate session token: {0}")]
    Token(String),

    #[error("failed to sign session cookie: {0}")]
    Signing(String),

    #[error("invalid cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),

    #[error("session ttl of {0} seconds is out of range")]
    Ttl(i64),
}

#[derive(Clone)]
pub struct SessionConfig {
    cookie_name: String,
    secret: SecretString,
    ttl_seconds: i64,
    cookie_secure: bool,
}

impl SessionConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secret,
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: String) -> Self {
        self.cookie_name = name;
        self
    }

    /// `0` (or less) disables expiry: sessions end only on logout.
    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds.max(0);
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Identity fields cached in a session at login.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for SessionIdentity {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Key/value view of a session. Zero entries means "no session".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionPayload(BTreeMap<String, String>);

impl SessionPayload {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The typed identity, when all three fields are present.
    #[must_use]
    pub fn identity(&self) -> Option<SessionIdentity> {
        Some(SessionIdentity {
            username: self.get(USERNAME_KEY)?.to_string(),
            first_name: self.get(FIRST_NAME_KEY)?.to_string(),
            last_name: self.get(LAST_NAME_KEY)?.to_string(),
        })
    }
}

impl From<SessionRecord> for SessionPayload {
    fn from(record: SessionRecord) -> Self {
        Self(BTreeMap::from([
            (USERNAME_KEY.to_string(), record.username),
            (FIRST_NAME_KEY.to_string(), record.first_name),
            (LAST_NAME_KEY.to_string(), record.last_name),
        ]))
    }
}

/// Creates, reads and invalidates sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Extract and verify the session token from the request cookies.
    /// Missing, malformed and mis-signed cookies all yield `None`.
    #[must_use]
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<SessionToken> {
        let value = cookie::find_cookie(headers, self.config.cookie_name())?;
        let token = cookie::decode(&self.config, value);
        if token.is_none() {
            debug!("Ignoring session cookie with invalid signature");
        }
        token
    }

    /// Start a new session for `identity`, replacing the session named by
    /// `replacing` if there is one.
    ///
    /// # Errors
    /// Returns an error if the store fails or no unique token could be issued.
    #[instrument(skip(self, replacing))]
    pub async fn create(
        &self,
        replacing: Option<&SessionToken>,
        identity: SessionIdentity,
    ) -> Result<SessionToken, SessionError> {
        if let Some(previous) = replacing {
            self.store.delete(&previous.storage_key()).await?;
        }

        let expires_at = match self.config.ttl_seconds {
            0 => None,
            ttl => Some(
                Duration::try_seconds(ttl)
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                    .ok_or(SessionError::Ttl(ttl))?,
            ),
        };
        let record = SessionRecord {
            username: identity.username,
            first_name: identity.first_name,
            last_name: identity.last_name,
            expires_at,
        };

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = SessionToken::generate()?;
            match self.store.insert(&token.storage_key(), record.clone()).await {
                Ok(()) => return Ok(token),
                Err(SessionError::Collision) => {
                    warn!("Session token collision, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        Err(SessionError::Collision)
    }

    /// Payload for `token`, or an empty payload when there is no live session.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn read(&self, token: Option<&SessionToken>) -> Result<SessionPayload, SessionError> {
        let Some(token) = token else {
            return Ok(SessionPayload::empty());
        };
        Ok(self
            .store
            .get(&token.storage_key())
            .await?
            .map(SessionPayload::from)
            .unwrap_or_default())
    }

    /// Convenience for [`Self::read`] straight from request headers.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn read_from_headers(&self, headers: &HeaderMap) -> Result<SessionPayload, SessionError> {
        self.read(self.token_from_headers(headers).as_ref()).await
    }

    /// End the session named by `token`. Idempotent; no token is a no-op.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn invalidate(&self, token: Option<&SessionToken>) -> Result<(), SessionError> {
        match token {
            Some(token) => self.store.delete(&token.storage_key()).await,
            None => Ok(()),
        }
    }

    /// Drop expired sessions from the store.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        self.store.purge_expired().await
    }

    /// Signed cookie value for `token` (what the client sends back).
    ///
    /// # Errors
    /// Returns an error if the value cannot be signed.
    pub fn cookie_value(&self, token: &SessionToken) -> Result<String, SessionError> {
        cookie::encode(&self.config, token)
    }

    /// `Set-Cookie` header value carrying `token`.
    ///
    /// # Errors
    /// Returns an error if the cookie cannot be signed or encoded.
    pub fn session_cookie(&self, token: &SessionToken) -> Result<HeaderValue, SessionError> {
        cookie::set_cookie(&self.config, &self.cookie_value(token)?)
    }

    /// `Set-Cookie` header value expiring the session cookie immediately.
    ///
    /// # Errors
    /// Returns an error if the cookie name makes an invalid header.
    pub fn clear_cookie(&self) -> Result<HeaderValue, SessionError> {
        cookie::clear_cookie(&self.config)
    }
}
