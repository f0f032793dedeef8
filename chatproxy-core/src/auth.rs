//! Caller identity seam.
//!
//! Session mechanics live outside this core; the relay only needs a yes/no
//! answer before it will touch the upstream.

use async_trait::async_trait;
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

#[async_trait]
pub trait SessionAuth: Send + Sync {
    /// Returns true when the request carries a valid caller identity.
    async fn authenticate(&self, headers: &HeaderMap) -> bool;
}

/// Accepts callers presenting a fixed bearer token.
pub struct BearerTokenAuth {
    token: SecretString,
}

impl BearerTokenAuth {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl SessionAuth for BearerTokenAuth {
    async fn authenticate(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(http::header::AUTHORIZATION) else {
            return false;
        };
        let Ok(value) = value.to_str() else {
            return false;
        };
        match value.strip_prefix("Bearer ") {
            Some(presented) => presented == self.token.expose_secret(),
            None => false,
        }
    }
}

/// Accepts everyone. Local development only.
pub struct AllowAll;

#[async_trait]
impl SessionAuth for AllowAll {
    async fn authenticate(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

#[cfg(test)]
pub struct DenyAll;

#[cfg(test)]
#[async_trait]
impl SessionAuth for DenyAll {
    async fn authenticate(&self, _headers: &HeaderMap) -> bool {
        false
    }
}
