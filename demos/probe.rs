//! Probe a directory deployment with the connection manager
//!
//! Reads a JSON configuration record and runs one connect cycle, then a
//! second one after a reset to show the cached server preference.
//!
//! ```bash
//! cat > /tmp/ldap.json <<'JSON'
//! {
//!   "host": "ldap://ldap1.example.com",
//!   "backupHost": "ldap://ldap2.example.com",
//!   "agentName": "cn=agent,dc=example,dc=com",
//!   "agentPassword": "secret",
//!   "tlsRequired": true
//! }
//! JSON
//!
//! RUST_LOG=ldap_failover=debug cargo run --example probe -- /tmp/ldap.json
//! ```
//!
//! Set `LDAP_CA_CERT` to trust a private CA, or `LDAP_INSECURE=true` to skip
//! certificate verification.

use ldap_failover::{
    ConnectionConfig, ConnectionManager, MemoryDecisionCache, TlsConfig, WireBackend,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: probe <configuration.json>")?;
    let config = ConnectionConfig::from_json(&std::fs::read_to_string(path)?)?;
    println!("{:#?}", config);

    let mut tls = TlsConfig::builder().danger_accept_invalid_certs(
        std::env::var("LDAP_INSECURE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    );
    if let Ok(ca) = std::env::var("LDAP_CA_CERT") {
        tls = tls.ca_cert_path(ca);
    }
    let backend = WireBackend::with_tls(tls.build()?);

    let cache = Arc::new(MemoryDecisionCache::new());
    let mut manager = ConnectionManager::new(backend, cache, config);

    for round in 1..=2 {
        match manager.init().await {
            Ok(true) => println!(
                "round {}: bound via {}",
                round,
                manager
                    .current_server()
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            ),
            Ok(false) => println!("round {}: credentials rejected or configuration inactive", round),
            Err(e) => println!("round {}: {}", round, e),
        }
        manager.reset_connection_resource().await;
    }

    Ok(())
}
