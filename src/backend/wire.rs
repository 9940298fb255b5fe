//! `DirectoryBackend` over real LDAP sessions

use super::DirectoryBackend;
use crate::client::host::LdapUrl;
use crate::connection::{LdapConnection, LdapOption, TlsConfig};
use crate::protocol::ResultCode;
use crate::{Error, Result};
use std::time::Duration;

/// Backend speaking LDAPv3 over TCP, TLS or Unix sockets
#[derive(Debug, Clone, Default)]
pub struct WireBackend {
    tls: Option<TlsConfig>,
}

impl WireBackend {
    /// Backend without TLS support (`ldap://` and `ldapi://` only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend able to do StartTLS and `ldaps://`
    pub fn with_tls(tls: TlsConfig) -> Self {
        Self { tls: Some(tls) }
    }

    /// TLS configuration in use
    pub fn tls_config(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }
}

impl DirectoryBackend for WireBackend {
    type Handle = LdapConnection;

    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<LdapConnection> {
        let url = LdapUrl::parse(host)?;
        let port = url.effective_port(port);
        LdapConnection::connect(&url, port, timeout, self.tls.as_ref()).await
    }

    fn set_option(&self, handle: &mut LdapConnection, option: LdapOption) -> Result<()> {
        handle.set_option(option)
    }

    async fn start_tls(&self, handle: &mut LdapConnection) -> Result<()> {
        let tls = self
            .tls
            .as_ref()
            .ok_or_else(|| Error::Tls("StartTLS requested but no TlsConfig configured".into()))?;
        handle.start_tls(tls).await
    }

    async fn bind(
        &self,
        handle: &mut LdapConnection,
        dn: &str,
        password: &str,
    ) -> Result<ResultCode> {
        let result = handle.simple_bind(dn, password).await?;
        if !result.code.is_success() {
            tracing::debug!(host = %handle.host(), dn, result = %result, "bind rejected");
        }
        Ok(result.code)
    }

    fn is_valid(&self, handle: &LdapConnection) -> bool {
        handle.is_open()
    }

    async fn unbind(&self, handle: LdapConnection) {
        let host = handle.host().to_string();
        if let Err(e) = handle.unbind().await {
            tracing::debug!(host = %host, error = %e, "unbind failed");
        }
    }
}
