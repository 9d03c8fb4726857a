//! Fakes shared by the unit tests in this crate

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use session_auth::AuthEndpoints;
use tokio::sync::Semaphore;
use transport::{ApiRequest, ApiResponse, SendFuture, StatusCode, Transport};

use crate::clock::Clock;

/// Fixed "now" used across tests: 2024-12-29T19:20:00Z
pub const NOW_MILLIS: u64 = 1_735_500_000_000;

pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(now_millis),
        }
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Unsigned token carrying `sub` and `exp` (unix seconds).
pub fn token(sub: Option<&str>, exp: Option<i64>) -> String {
    let mut payload = serde_json::Map::new();
    if let Some(sub) = sub {
        payload.insert("sub".into(), sub.into());
    }
    if let Some(exp) = exp {
        payload.insert("exp".into(), exp.into());
    }
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(serde_json::Value::Object(payload).to_string())
    )
}

/// Token that stays valid for an hour past `NOW_MILLIS`.
pub fn fresh_token(sub: &str) -> String {
    token(Some(sub), Some((NOW_MILLIS / 1000) as i64 + 3600))
}

/// In-memory backend.
///
/// Resource paths answer 200 when the bearer matches the accepted token and
/// 401 otherwise. A successful refresh makes its token the accepted one,
/// as the real server would.
pub struct ScriptedTransport {
    endpoints: AuthEndpoints,
    accepted: Mutex<Option<String>>,
    refresh_token: Mutex<Option<String>>,
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    reject_everything: AtomicBool,
    disconnect_bearer: Mutex<Option<String>>,
    refresh_calls: AtomicUsize,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: AuthEndpoints::default(),
            accepted: Mutex::new(None),
            refresh_token: Mutex::new(None),
            refresh_gate: Mutex::new(None),
            reject_everything: AtomicBool::new(false),
            disconnect_bearer: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Bearer the resource endpoints accept.
    pub fn accept(&self, token: &str) {
        *self.accepted.lock().unwrap() = Some(token.to_owned());
    }

    /// Make refresh succeed with `token`.
    pub fn refresh_returns(&self, token: &str) {
        *self.refresh_token.lock().unwrap() = Some(token.to_owned());
    }

    /// Make refresh answer 401.
    pub fn refresh_fails(&self) {
        *self.refresh_token.lock().unwrap() = None;
    }

    /// Resource endpoints answer 401 no matter what.
    pub fn reject_everything(&self) {
        self.reject_everything.store(true, Ordering::SeqCst);
    }

    /// Resource requests carrying `token` fail at the transport level.
    pub fn disconnect_on_bearer(&self, token: &str) {
        *self.disconnect_bearer.lock().unwrap() = Some(token.to_owned());
    }

    /// Hold refresh calls until a permit is added to the returned semaphore.
    pub fn hold_refresh(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.refresh_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// `(path, bearer)` for every request sent, in order.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Bearers sent to `path`, in order.
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer)
            .collect()
    }

    async fn respond(&self, request: &ApiRequest) -> transport::Result<ApiResponse> {
        let path = request.path().to_owned();
        let bearer = request.bearer().map(str::to_owned);
        self.requests.lock().unwrap().push((path.clone(), bearer.clone()));

        let disconnected = self.disconnect_bearer.lock().unwrap().clone();
        if bearer.is_some() && bearer == disconnected {
            return Err(transport::Error::Request("connection reset".into()));
        }
        Ok(self.reply(&path, bearer).await)
    }

    async fn reply(&self, path: &str, bearer: Option<String>) -> ApiResponse {
        if path == self.endpoints.refresh {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.refresh_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            let outcome = self.refresh_token.lock().unwrap().clone();
            return match outcome {
                Some(token) => {
                    self.accept(&token);
                    json_response(StatusCode::OK, serde_json::json!({"access_token": token}))
                }
                None => ApiResponse::new(StatusCode::UNAUTHORIZED, "Token doesn't exist"),
            };
        }

        if path == self.endpoints.login {
            return json_response(
                StatusCode::OK,
                serde_json::json!({"access_token": fresh_token("alice"), "token_type": "bearer"}),
            );
        }

        if path.starts_with(&self.endpoints.prefix) {
            return ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        }

        if path.starts_with("/error/") {
            return ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        }

        let accepted = self.accepted.lock().unwrap().clone();
        if self.reject_everything.load(Ordering::SeqCst)
            || accepted.is_none()
            || bearer != accepted
        {
            return ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        }
        ApiResponse::new(StatusCode::OK, format!("ok:{path}"))
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        Box::pin(self.respond(request))
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
