//! Connection management
//!
//! This module handles:
//! * Transport abstraction (TCP vs Unix socket)
//! * LDAP session lifecycle (connect, options, StartTLS, bind, unbind)
//! * State machine enforcement for the manager's handle
//! * TLS configuration and support

mod conn;
mod state;
mod tls;
mod transport;

pub use conn::{LdapConnection, LdapOption, SessionOptions};
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
