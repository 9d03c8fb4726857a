//! userdb command-line client
//!
//! Single-binary client for the user database API that:
//! 1. Loads config and logs in with username and password
//! 2. Sends the requested API calls concurrently through one session
//! 3. Lets the session refresh the access token proactively or on 401
//! 4. Reports session expiry and exits non-zero when the user must log in again

mod cli;
mod config;
mod error;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use session_client::{Session, SessionStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{ApiRequest, HttpTransport, header};

use crate::cli::RequestSpec;
use crate::config::Config;

/// Exit code when the session ended and the user has to log in again
const EXIT_SESSION_EXPIRED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs to stderr with LOG_LEVEL / RUST_LOG support; stdout carries results
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = cli::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    // Before the session exists, so no counter increment is lost
    let prometheus = if args.metrics {
        Some(metrics::install_recorder().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        username = %config.credentials.username,
        requests = args.requests.len(),
        "configuration loaded"
    );

    let password = config
        .credentials
        .password
        .as_ref()
        .ok_or(error::Error::MissingPassword)?;

    let transport = HttpTransport::new(config.api.base_url.clone(), config.timeout())
        .context("failed to build HTTP client")?;
    let session = Session::new(Arc::new(transport), config.session_config());
    let status = session.status();

    session
        .login(&config.credentials.username, password)
        .await
        .context("login failed")?;
    info!(
        username = session.username().as_deref().unwrap_or("<unknown>"),
        "signed in"
    );

    let requests: Vec<ApiRequest> = args.requests.iter().map(build_request).collect();
    let outcomes = join_all(requests.into_iter().map(|request| session.send(request))).await;

    let mut failed = false;
    for (entry, outcome) in args.requests.iter().zip(outcomes) {
        match outcome {
            Ok(response) => {
                println!("{} {} -> {}", entry.method, entry.path, response.status());
                let body = response.text();
                if !body.is_empty() {
                    println!("{body}");
                }
                failed |= !response.status().is_success();
            }
            Err(e) => {
                warn!(method = %entry.method, path = %entry.path, error = %e, "request failed");
                println!("{} {} -> error: {e}", entry.method, entry.path);
                failed = true;
            }
        }
    }

    info!(status = status.borrow().label(), failed, "requests finished");
    let expired = *status.borrow() == SessionStatus::Expired;
    if !expired {
        session.logout();
    }

    if let Some(prometheus) = prometheus {
        eprintln!("{}", prometheus.render());
    }

    if expired {
        eprintln!("{}", error::Error::SessionExpired);
        std::process::exit(EXIT_SESSION_EXPIRED);
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn build_request(spec: &RequestSpec) -> ApiRequest {
    let request = ApiRequest::new(spec.method.clone(), spec.path.clone());
    match &spec.json {
        Some(body) => request.body(body.clone()).header(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        ),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::Method;

    #[test]
    fn build_request_attaches_json_body() {
        let spec = RequestSpec {
            method: Method::POST,
            path: "/users".into(),
            json: Some(r#"{"name":"bob"}"#.into()),
        };

        let request = build_request(&spec);

        assert_eq!(*request.method(), Method::POST);
        assert_eq!(request.path(), "/users");
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body_bytes().unwrap().as_ref(),
            br#"{"name":"bob"}"#
        );
    }

    #[test]
    fn build_request_without_body() {
        let spec = RequestSpec {
            method: Method::GET,
            path: "/users?page=2".into(),
            json: None,
        };

        let request = build_request(&spec);

        assert!(request.body_bytes().is_none());
        assert_eq!(request.path_without_query(), "/users");
    }
}
