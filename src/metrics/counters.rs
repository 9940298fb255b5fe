//! Counter metrics

use super::labels;
use metrics::counter;

/// A connection attempt was started against `server`
pub fn connect_attempted(server: &'static str) {
    counter!(
        "ldap_failover_connect_attempted_total",
        labels::SERVER => server
    )
    .increment(1);
}

/// Opening or configuring a handle failed
pub fn connect_failed(server: &'static str, reason: &'static str) {
    counter!(
        "ldap_failover_connect_failed_total",
        labels::SERVER => server,
        labels::REASON => reason
    )
    .increment(1);
}

/// The manager switched to the other server within one cycle
pub fn failover_triggered() {
    counter!("ldap_failover_failover_triggered_total").increment(1);
}

/// A bind completed with the given classification
pub fn bind_outcome(server: &'static str, outcome: &'static str) {
    counter!(
        "ldap_failover_bind_outcome_total",
        labels::SERVER => server,
        labels::OUTCOME => outcome
    )
    .increment(1);
}

pub fn tls_negotiation_failed(server: &'static str) {
    counter!(
        "ldap_failover_tls_negotiation_failed_total",
        labels::SERVER => server
    )
    .increment(1);
}

/// The override flag was written to the decision cache
pub fn cache_written(value: bool) {
    counter!(
        "ldap_failover_cache_writes_total",
        labels::VALUE => if value { "true" } else { "false" }
    )
    .increment(1);
}
