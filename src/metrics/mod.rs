//! Metrics collection
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! application installs a recorder.
//!
//! Counters:
//! * `ldap_failover_connect_attempted_total{server}`
//! * `ldap_failover_connect_failed_total{server, reason}`
//! * `ldap_failover_failover_triggered_total`
//! * `ldap_failover_bind_outcome_total{server, outcome}`
//! * `ldap_failover_tls_negotiation_failed_total{server}`
//! * `ldap_failover_cache_writes_total{value}`
//!
//! Histograms:
//! * `ldap_failover_bind_duration_ms{server}`

pub mod counters;
pub mod histograms;
pub mod labels;
