//! Default auth endpoint layout and refresh timing

use std::time::Duration;

/// Path prefix shared by every auth endpoint
pub const AUTH_PREFIX: &str = "/auth/";

/// Username/password exchange
pub const LOGIN_PATH: &str = "/auth/login";

/// Refresh-cookie exchange for a new access token
pub const REFRESH_PATH: &str = "/auth/refresh";

/// How long before expiry the proactive refresh fires
pub const REFRESH_BUFFER: Duration = Duration::from_secs(60);
