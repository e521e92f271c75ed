//! Authentication session.
//!
//! Holds the bearer token of the logged-in user and persists it in the local
//! store. Token issuance and verification belong to the server; this side
//! only knows whether a token is present and, for JWTs, whether its `exp`
//! claim has passed.

use std::sync::{Arc, PoisonError, RwLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use crate::store::{LocalStore, keys};

/// Claims we read from a JWT payload.
#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
    sub: Option<String>,
    id: Option<String>,
}

/// Authentication state shared by the cart engine and the front end.
///
/// Cheaply cloneable; clones share the same token.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    store: LocalStore,
    token: RwLock<Option<SecretString>>,
}

impl AuthSession {
    /// Restore the session from the local store.
    #[must_use]
    pub fn load(store: LocalStore) -> Self {
        let token = store.load::<String>(keys::AUTH_TOKEN).map(SecretString::from);

        Self {
            inner: Arc::new(AuthSessionInner {
                store,
                token: RwLock::new(token),
            }),
        }
    }

    /// The current bearer token, if any and not expired.
    ///
    /// An expired JWT is discarded (from memory and the local store) and
    /// `None` is returned, which puts the caller on the guest path.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        let token = self
            .inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        if let Some(expires_at) = expires_at(&token)
            && expires_at <= Utc::now()
        {
            warn!(%expires_at, "Bearer token expired, discarding");
            self.discard();
            return None;
        }

        Some(token)
    }

    /// Whether a usable token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a freshly issued token.
    pub fn set_token(&self, token: SecretString) {
        self.inner.store.save(keys::AUTH_TOKEN, token.expose_secret());
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
        info!("Bearer token stored");
    }

    /// Forget the token (logout, or rejection by the server).
    pub fn discard(&self) {
        self.inner.store.remove(keys::AUTH_TOKEN);
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self
            .inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("AuthSession")
            .field("token", if present { &"[REDACTED]" } else { &"None" })
            .finish()
    }
}

/// Expiry of a JWT bearer token.
///
/// Returns `None` for opaque tokens and JWTs without an `exp` claim; those
/// never expire on this side.
#[must_use]
pub fn expires_at(token: &SecretString) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(decode_claims(token)?.exp?, 0)
}

/// User id carried by a JWT bearer token (`sub`, or the server's `id`).
#[must_use]
pub fn user_id(token: &SecretString) -> Option<String> {
    let claims = decode_claims(token)?;
    claims.sub.or(claims.id)
}

/// Decode the payload of a `header.payload.signature` token. The signature
/// is not checked; that is the server's job.
fn decode_claims(token: &SecretString) -> Option<Claims> {
    let mut parts = token.expose_secret().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
