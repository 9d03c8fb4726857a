//! Which request paths belong to the auth endpoints

use crate::constants::{AUTH_PREFIX, LOGIN_PATH, REFRESH_PATH};

/// Auth endpoint paths, relative to the API base URL.
///
/// Requests under `prefix` never carry a bearer token and never trigger a
/// reactive refresh, so a failing refresh cannot recurse into itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub prefix: String,
    pub login: String,
    pub refresh: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            prefix: AUTH_PREFIX.into(),
            login: LOGIN_PATH.into(),
            refresh: REFRESH_PATH.into(),
        }
    }
}

impl AuthEndpoints {
    /// Whether `path` targets an auth endpoint. Expects the path without its
    /// query string, as returned by `ApiRequest::path_without_query`.
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        path.starts_with(&self.prefix) || path == self.login || path == self.refresh
    }
}
