//! The bearer credential held by the token store

use common::Secret;

use crate::claims::{self, Claims};

/// An access token plus the claims read from it at construction.
///
/// Credentials are replaced, never mutated: a refresh produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: Secret<String>,
    claims: Option<Claims>,
}

impl Credential {
    /// Wrap a raw token. Unreadable claims are recorded as absent.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let claims = claims::decode(&token);
        Self {
            token: Secret::new(token),
            claims,
        }
    }

    /// Raw bearer string (use sparingly)
    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref()?.subject.as_deref()
    }

    /// Display username: the subject when present and not blank.
    pub fn username(&self) -> Option<&str> {
        self.claims.as_ref()?.username()
    }

    pub fn expires_at_millis(&self) -> Option<u64> {
        self.claims.as_ref()?.expires_at_millis
    }
}
