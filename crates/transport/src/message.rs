//! Request and response values passed through the transport

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// An outgoing API call.
///
/// `path` is relative to the transport's base URL and must start with `/`.
/// The retry marker records that the request was already re-issued once after
/// a reactive token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| Error::Body(format!("serializing request body: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Attach an opaque body. The caller sets the content type.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path with any query string removed.
    pub fn path_without_query(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    /// The header is marked sensitive so it is not printed by Debug.
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::InvalidHeader(format!("bearer token: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Token from the `Authorization: Bearer` header, if one is set.
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// A response as received; the body is not interpreted here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Body(format!("invalid JSON body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_sets_content_type() {
        let request = ApiRequest::post("/users")
            .json(&serde_json::json!({"name": "alice"}))
            .unwrap();
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body_bytes().unwrap().as_ref(),
            br#"{"name":"alice"}"#
        );
    }

    #[test]
    fn set_bearer_replaces_previous_token() {
        let mut request = ApiRequest::get("/users");
        assert_eq!(request.bearer(), None);

        request.set_bearer("old").unwrap();
        request.set_bearer("new").unwrap();
        assert_eq!(request.bearer(), Some("new"));
        assert_eq!(request.headers().get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn set_bearer_rejects_control_characters() {
        let mut request = ApiRequest::get("/users");
        let result = request.set_bearer("bad\ntoken");
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
        assert_eq!(request.bearer(), None);
    }

    #[test]
    fn bearer_header_is_redacted_in_debug() {
        let mut request = ApiRequest::get("/users");
        request.set_bearer("at_secret").unwrap();
        let debug = format!("{request:?}");
        assert!(!debug.contains("at_secret"), "token leaked: {debug}");
    }

    #[test]
    fn retry_marker_starts_unset() {
        let mut request = ApiRequest::delete("/users/7");
        assert!(!request.is_retried());
        request.mark_retried();
        assert!(request.is_retried());
        assert!(request.clone().is_retried());
    }

    #[test]
    fn path_without_query_strips_query_string() {
        let request = ApiRequest::get("/users?page=2");
        assert_eq!(request.path_without_query(), "/users");
        assert_eq!(ApiRequest::get("/users").path_without_query(), "/users");
    }

    #[test]
    fn response_json_and_text() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"access_token":"at"}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["access_token"], "at");
        assert_eq!(response.text(), r#"{"access_token":"at"}"#);
        assert!(!response.is_unauthorized());
    }

    #[test]
    fn response_json_error_is_body_error() {
        let response = ApiResponse::new(StatusCode::OK, "not json");
        let result: Result<serde_json::Value> = response.json();
        assert!(matches!(result, Err(Error::Body(_))));
    }
}
