//! Login and token refresh calls
//!
//! Handles the two auth endpoint interactions:
//! 1. Login: username/password for an access token (the server also sets the
//!    http-only refresh cookie)
//! 2. Refresh: no body, authenticated only by that cookie
//!
//! Both go straight to the transport. They never carry a bearer header and
//! never pass through request authentication.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;
use transport::{ApiRequest, ApiResponse, StatusCode, Transport};

use crate::credential::Credential;
use crate::endpoints::AuthEndpoints;
use crate::error::{Error, Result};

/// Response body shared by login and refresh.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Exchange username and password for a credential.
///
/// Only an exact 200 with a non-empty `access_token` succeeds; any other
/// status, a missing token, or a transport failure is a rejected login.
pub async fn login(
    transport: &dyn Transport,
    endpoints: &AuthEndpoints,
    username: &str,
    password: &Secret<String>,
) -> Result<Credential> {
    let request = ApiRequest::post(endpoints.login.as_str())
        .json(&LoginBody {
            username,
            password: password.expose(),
        })
        .map_err(|e| Error::Http(format!("building login request: {e}")))?;

    let response = transport
        .send(&request)
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::LoginRejected(format!("login returned {status}")));
    }

    let token = access_token(&response)
        .ok_or_else(|| Error::LoginRejected("login response has no access_token".into()))?;
    debug!(username, "login succeeded");
    Ok(Credential::new(token))
}

/// Trade the refresh cookie for a new credential.
pub async fn refresh(transport: &dyn Transport, endpoints: &AuthEndpoints) -> Result<Credential> {
    let request = ApiRequest::post(endpoints.refresh.as_str());

    let response = transport
        .send(&request)
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::RefreshRejected(format!(
            "refresh returned {status}: {}",
            response.text()
        )));
    }

    let token = access_token(&response).ok_or_else(|| {
        Error::MalformedResponse("refresh response has no access_token".into())
    })?;
    Ok(Credential::new(token))
}

fn access_token(response: &ApiResponse) -> Option<String> {
    response
        .json::<TokenResponse>()
        .ok()
        .map(|body| body.access_token)
        .filter(|token| !token.is_empty())
}
