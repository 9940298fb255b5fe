//! Histogram metrics

use super::labels;
use metrics::histogram;

/// Time spent in a single bind request, in milliseconds
pub fn bind_duration(server: &'static str, duration_ms: u64) {
    histogram!(
        "ldap_failover_bind_duration_ms",
        labels::SERVER => server
    )
    .record(duration_ms as f64);
}
