//! ldap-failover: resilient LDAP connections with primary/backup failover
//!
//! A [`ConnectionManager`] keeps one authenticated handle to a directory
//! server. Each connect cycle:
//!
//! 1. consults the [`DecisionCache`] to pick the primary or the backup server
//! 2. connects, applies protocol options, and upgrades with StartTLS if required
//! 3. binds with the configured service account
//! 4. on an unreachable server, retries once against the other server
//! 5. records which server worked
//!
//! Rejected credentials are reported as `Ok(false)`, never as an error.
//!
//! The network side is abstracted by [`DirectoryBackend`]; [`WireBackend`]
//! speaks LDAPv3 directly over TCP, TLS or Unix sockets.

pub mod backend;
pub mod cache;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use backend::{DirectoryBackend, WireBackend};
pub use cache::{DecisionCache, MemoryDecisionCache, OVERRIDE_MAIN_SERVER_KEY};
pub use client::{
    BindResult, ConfigurationRecord, ConnectionConfig, ConnectionConfigBuilder, ConnectionManager,
    ServerChoice,
};
pub use connection::{ConnectionState, LdapOption, TlsConfig};
pub use error::{Error, Result};
pub use protocol::ResultCode;
