//! Connection manager and its configuration
//!
//! [`ConnectionManager`] is the entry point: it turns a [`ConnectionConfig`]
//! into an authenticated handle, failing over to the backup server when the
//! primary cannot be reached.

pub mod bind;
pub mod config;
pub mod host;
pub mod manager;

pub use bind::BindResult;
pub use config::{ConfigurationRecord, ConnectionConfig, ConnectionConfigBuilder};
pub use host::{LdapUrl, Scheme};
pub use manager::{ConnectionManager, ServerChoice};
