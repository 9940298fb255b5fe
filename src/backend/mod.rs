//! Transport layer contract consumed by the connection manager
//!
//! The manager never touches sockets itself. It drives a [`DirectoryBackend`],
//! which hands out opaque handles and performs the protocol calls on them.
//! [`WireBackend`] is the real implementation on top of
//! [`LdapConnection`](crate::connection::LdapConnection); tests substitute
//! scripted backends.

mod wire;

pub use wire::WireBackend;

use crate::connection::LdapOption;
use crate::protocol::ResultCode;
use crate::Result;
use std::future::Future;
use std::time::Duration;

/// Directory protocol operations, one call per protocol step
pub trait DirectoryBackend: Send + Sync {
    /// One network resource to one server
    type Handle: Send;

    /// Open a handle to `host:port`
    ///
    /// `host` is the configured value and may carry a URL scheme.
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Handle>> + Send;

    /// Apply a protocol option
    fn set_option(&self, handle: &mut Self::Handle, option: LdapOption) -> Result<()>;

    /// Upgrade the handle with StartTLS
    fn start_tls(&self, handle: &mut Self::Handle) -> impl Future<Output = Result<()>> + Send;

    /// Simple bind
    ///
    /// `Ok` carries the server's result code, whatever it is. `Err` means the
    /// server could not be talked to.
    fn bind(
        &self,
        handle: &mut Self::Handle,
        dn: &str,
        password: &str,
    ) -> impl Future<Output = Result<ResultCode>> + Send;

    /// Whether the handle can still carry requests
    fn is_valid(&self, handle: &Self::Handle) -> bool;

    /// Release the handle, telling the server when possible
    fn unbind(&self, handle: Self::Handle) -> impl Future<Output = ()> + Send;
}
