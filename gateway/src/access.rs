//! Request access log.
//!
//! Every API and admin request is emitted via `tracing` with a dedicated
//! target so it can be filtered and formatted (e.g. JSON) separately from
//! application logs.

use tracing::{info, warn};

pub const ACCESS_TARGET: &str = "recordgate::access";

/// Log one served HTTP request. Server-side failures are logged at `warn`.
pub fn http_request(method: &str, path: &str, status: u16) {
    if status >= 500 {
        warn!(
            target: ACCESS_TARGET,
            event = "http_request",
            method = %method,
            path = %path,
            status = %status,
        );
    } else {
        info!(
            target: ACCESS_TARGET,
            event = "http_request",
            method = %method,
            path = %path,
            status = %status,
        );
    }
}

/// Log a readiness probe that found a dependency down.
pub fn dependency_unready(dependency: &str, reason: &str) {
    warn!(
        target: ACCESS_TARGET,
        event = "dependency_unready",
        dependency = %dependency,
        reason = %reason,
    );
}
