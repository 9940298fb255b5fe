//! One LDAPv3 session over a transport

use super::tls::TlsConfig;
use super::transport::Transport;
use crate::client::host::{LdapUrl, Scheme};
use crate::protocol::constants::{OID_NOTICE_OF_DISCONNECTION, PROTOCOL_VERSION};
use crate::protocol::{
    decode_message, encode_message, LdapRequest, LdapResponse, LdapResult, ResponseOp,
};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::io;
use std::time::Duration;

/// Session option, applied after connect and before StartTLS/bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdapOption {
    /// Protocol version (only 3 is supported)
    ProtocolVersion(u8),
    /// Whether referrals are chased
    Referrals(bool),
    /// Upper bound for each request/response round trip
    NetworkTimeout(Duration),
}

/// Options currently in effect on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Protocol version sent in bind requests
    pub protocol_version: u8,
    /// Referral chasing (never performed; recorded for callers)
    pub referrals: bool,
    /// Per-request timeout
    pub network_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            referrals: false,
            network_timeout: Duration::from_secs(15),
        }
    }
}

/// LDAP session
pub struct LdapConnection {
    transport: Option<Transport>,
    host: String,
    read_buf: BytesMut,
    next_message_id: i32,
    options: SessionOptions,
    closed: bool,
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection")
            .field("host", &self.host)
            .field("tls", &self.is_tls())
            .field("options", &self.options)
            .field("closed", &self.closed)
            .finish()
    }
}

impl LdapConnection {
    /// Create a session from an open transport
    pub fn new(transport: Transport, host: impl Into<String>) -> Self {
        Self {
            transport: Some(transport),
            host: host.into(),
            read_buf: BytesMut::with_capacity(1024),
            next_message_id: 1,
            options: SessionOptions::default(),
            closed: false,
        }
    }

    /// Open a transport to `url` and wrap it in a session
    ///
    /// `ldaps://` needs `tls`; the handshake happens here.
    pub async fn connect(
        url: &LdapUrl,
        port: u16,
        timeout: Duration,
        tls: Option<&TlsConfig>,
    ) -> Result<Self> {
        let transport = match url.scheme {
            Scheme::Ldap => Transport::connect_tcp(&url.host, port, timeout).await?,
            Scheme::Ldaps => {
                let tls = tls.ok_or_else(|| {
                    Error::Tls(format!("ldaps://{} requires a TlsConfig", url.host))
                })?;
                Transport::connect_tcp_tls(&url.host, port, timeout, tls).await?
            }
            Scheme::Ldapi => {
                let path = url
                    .socket_path
                    .as_ref()
                    .ok_or_else(|| Error::Config("ldapi:// without socket path".into()))?;
                Transport::connect_unix(path, timeout).await?
            }
        };

        tracing::debug!(host = %url.host, port, scheme = %url.scheme, "transport connected");

        let mut conn = Self::new(transport, url.host.clone());
        conn.options.network_timeout = timeout;
        Ok(conn)
    }

    /// Host this session talks to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Options in effect
    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Whether the transport is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_tls)
    }

    /// Whether the session can still carry requests
    pub fn is_open(&self) -> bool {
        !self.closed && self.transport.is_some()
    }

    /// Apply a session option
    pub fn set_option(&mut self, option: LdapOption) -> Result<()> {
        match option {
            LdapOption::ProtocolVersion(PROTOCOL_VERSION) => {
                self.options.protocol_version = PROTOCOL_VERSION;
            }
            LdapOption::ProtocolVersion(other) => {
                return Err(Error::Config(format!(
                    "unsupported LDAP protocol version {}",
                    other
                )));
            }
            LdapOption::Referrals(chase) => self.options.referrals = chase,
            LdapOption::NetworkTimeout(timeout) => {
                if timeout.is_zero() {
                    return Err(Error::Config("network timeout must be non-zero".into()));
                }
                self.options.network_timeout = timeout;
            }
        }
        Ok(())
    }

    /// Issue StartTLS and upgrade the transport when the server agrees
    ///
    /// A non-success result code from the server is reported as [`Error::Tls`].
    pub async fn start_tls(&mut self, tls_config: &TlsConfig) -> Result<()> {
        if self.is_tls() {
            return Err(Error::Tls("session is already TLS-encrypted".into()));
        }

        let response = self.request(&LdapRequest::start_tls()).await?;
        let result = match response {
            ResponseOp::Extended { result, .. } => result,
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected response to StartTLS: {:?}",
                    other
                )))
            }
        };

        if !result.code.is_success() {
            tracing::debug!(host = %self.host, result = %result, "server refused StartTLS");
            return Err(Error::Tls(format!("server refused StartTLS: {}", result)));
        }

        if !self.read_buf.is_empty() {
            return Err(Error::Protocol(
                "unexpected data after StartTLS response".into(),
            ));
        }

        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        let upgrade = transport.upgrade_to_tls(tls_config, &self.host);
        let upgraded = tokio::time::timeout(self.options.network_timeout, upgrade)
            .await
            .map_err(|_| Error::Timeout(self.options.network_timeout));
        match upgraded {
            Ok(Ok(transport)) => {
                self.transport = Some(transport);
                tracing::info!(host = %self.host, "TLS session established");
                Ok(())
            }
            Ok(Err(e)) | Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    /// Simple bind; the server's verdict is returned, not turned into an error
    pub async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<LdapResult> {
        let request = LdapRequest::SimpleBind {
            version: self.options.protocol_version,
            name: dn.to_string(),
            password: password.to_string(),
        };

        match self.request(&request).await? {
            ResponseOp::Bind(result) => Ok(result),
            other => Err(Error::Protocol(format!(
                "unexpected response to bind: {:?}",
                other
            ))),
        }
    }

    /// Send UnbindRequest and close the transport
    pub async fn unbind(mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let id = self.allocate_message_id();
        let _ = self.send_message(id, &LdapRequest::Unbind).await;
        self.closed = true;
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        transport.shutdown().await?;
        Ok(())
    }

    /// Send a request and wait for the response with the same message ID
    async fn request(&mut self, request: &LdapRequest) -> Result<ResponseOp> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let id = self.allocate_message_id();
        let timeout = self.options.network_timeout;

        let exchange = async {
            self.send_message(id, request).await?;
            loop {
                let response = self.receive_message().await?;
                if response.message_id == id {
                    return Ok(response.op);
                }
                self.handle_unsolicited(response)?;
            }
        };

        let outcome = match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(timeout)),
        };

        if let Err(e) = &outcome {
            if e.is_server_unavailable() {
                self.closed = true;
            }
        }
        outcome
    }

    fn handle_unsolicited(&mut self, response: LdapResponse) -> Result<()> {
        match response.op {
            ResponseOp::Extended { result, name }
                if response.message_id == 0
                    && name.as_deref() == Some(OID_NOTICE_OF_DISCONNECTION) =>
            {
                tracing::warn!(host = %self.host, result = %result, "notice of disconnection");
                self.closed = true;
                Err(Error::ConnectionClosed)
            }
            _ => {
                tracing::debug!(
                    message_id = response.message_id,
                    "ignoring response to another request"
                );
                Ok(())
            }
        }
    }

    fn allocate_message_id(&mut self) -> i32 {
        let id = self.next_message_id;
        // Message IDs are 1..=i32::MAX; 0 is reserved for notifications
        self.next_message_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    /// Send a request message
    async fn send_message(&mut self, id: i32, msg: &LdapRequest) -> Result<()> {
        let buf = encode_message(id, msg)?;
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        transport.write_all(&buf).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Receive a response message
    async fn receive_message(&mut self) -> Result<LdapResponse> {
        loop {
            match decode_message(&self.read_buf) {
                Ok((msg, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(msg);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(Error::Protocol(e.to_string())),
            }

            let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                self.closed = true;
                return Err(Error::ConnectionClosed);
            }
        }
    }
}
