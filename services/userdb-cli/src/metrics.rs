//! Prometheus metrics exposition
//!
//! Renders the counters the session emits:
//!
//! - `session_refresh_total` (counter): labels `trigger`, `outcome`
//! - `session_refresh_waiters_total` (counter)
//! - `session_request_retries_total` (counter)
//! - `session_expired_total` (counter)

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Must run before the session is built so no counter increment is lost.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
