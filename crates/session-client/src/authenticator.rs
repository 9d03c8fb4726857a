//! Bearer attachment and 401 recovery for outgoing requests
//!
//! Per request:
//! 1. Auth endpoints (login/refresh) pass through untouched
//! 2. Anything else gets `Authorization: Bearer <current token>` if one is held
//! 3. A 401 on a request not yet retried waits on the shared refresh, then the
//!    request is re-issued once with the refreshed token
//!
//! A 401 from an auth endpoint, or from a request that was already retried,
//! is returned to the caller unchanged.

use std::sync::Arc;

use session_auth::{AuthEndpoints, TokenStore};
use tracing::{Instrument, debug, info_span, warn};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::coordinator::{RefreshCoordinator, RefreshReason};
use crate::error::Result;

/// Request/response interception around a `Transport`.
#[derive(Clone)]
pub struct RequestAuthenticator {
    transport: Arc<dyn Transport>,
    endpoints: AuthEndpoints,
    store: TokenStore,
    coordinator: RefreshCoordinator,
}

impl RequestAuthenticator {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: AuthEndpoints,
        store: TokenStore,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            transport,
            endpoints,
            store,
            coordinator,
        }
    }

    /// Send `request`, authenticating it and recovering from one 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.path(),
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let auth_endpoint = self
            .endpoints
            .is_auth_endpoint(request.path_without_query());
        if !auth_endpoint {
            if let Some(credential) = self.store.get() {
                request.set_bearer(credential.token())?;
            }
        }

        loop {
            let response = self.transport.send(&request).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }

            if auth_endpoint {
                debug!("auth error on auth request, not retrying");
                return Ok(response);
            }

            if request.is_retried() {
                warn!("still unauthorized after token refresh, not retrying again");
                return Ok(response);
            }

            request.mark_retried();
            debug!("unauthorized, waiting for token refresh");
            let credential = self.coordinator.refresh(RefreshReason::Reactive).await?;
            request.set_bearer(credential.token())?;
            metrics::counter!("session_request_retries_total").increment(1);
            debug!("token refreshed, retrying");
        }
    }
}
