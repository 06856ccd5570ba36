//! Credential handling for the remote store
//!
//! The sync engine never talks OAuth; it asks a [`CredentialProvider`]
//! for a token and treats a refusal as an auth error. Interactive flows
//! (device codes, browser sign-in) live behind [`CredentialProvider::acquire`]
//! in whatever binary hosts them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{Result, WorklogError};

/// Tokens count as expired this many seconds before their real expiry,
/// so a token never goes stale mid-sync
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// A bearer credential for the drive
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Token valid for `ttl` from now
    pub fn with_ttl(secret: impl Into<String>, ttl: Duration) -> Self {
        Self::new(secret, Utc::now() + ttl)
    }

    /// Usable means not within the expiry margin of running out
    pub fn is_valid(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of drive credentials. Nothing here retries; a missing or stale
/// token surfaces as an auth error on every call that needs one.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A usable token, or an auth error when missing or stale
    fn current_token(&self) -> Result<AccessToken>;

    fn is_authenticated(&self) -> bool {
        self.current_token().is_ok()
    }

    /// Obtain a fresh token, interactively where the provider supports it
    async fn acquire(&self) -> Result<AccessToken>;

    /// Drop the held credential
    fn sign_out(&self);
}

/// Provider over a token supplied out-of-band (config file or
/// `WORKLOG_DRIVE_TOKEN`). It cannot mint new tokens.
#[derive(Default)]
pub struct StaticTokenProvider {
    token: Mutex<Option<AccessToken>>,
}

impl StaticTokenProvider {
    pub fn new(token: AccessToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    /// Empty provider; every remote call fails with an auth error
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: AccessToken) {
        *self.token.lock() = Some(token);
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    fn current_token(&self) -> Result<AccessToken> {
        match &*self.token.lock() {
            Some(token) if token.is_valid() => Ok(token.clone()),
            Some(_) => Err(WorklogError::Auth("drive token expired".into())),
            None => Err(WorklogError::Auth("not signed in to the drive".into())),
        }
    }

    async fn acquire(&self) -> Result<AccessToken> {
        self.current_token().map_err(|_| {
            WorklogError::Auth(
                "no interactive sign-in available; set drive_token in the config \
                 or export WORKLOG_DRIVE_TOKEN"
                    .into(),
            )
        })
    }

    fn sign_out(&self) {
        *self.token.lock() = None;
    }
}
