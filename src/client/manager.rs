//! Connection manager: server selection, connect, StartTLS, bind and failover

use super::bind::BindResult;
use super::config::ConnectionConfig;
use crate::backend::DirectoryBackend;
use crate::cache::{DecisionCache, OVERRIDE_MAIN_SERVER_KEY};
use crate::connection::{ConnectionState, LdapOption};
use crate::metrics::{counters, histograms, labels};
use crate::protocol::constants::PROTOCOL_VERSION;
use crate::{Error, Result};
use std::fmt;
use std::time::Instant;
use tracing::Instrument;

/// Which configured server a handle points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerChoice {
    Primary,
    Backup,
}

impl ServerChoice {
    /// The other server
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Backup,
            Self::Backup => Self::Primary,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Primary => labels::SERVER_PRIMARY,
            Self::Backup => labels::SERVER_BACKUP,
        }
    }
}

impl fmt::Display for ServerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of connecting and binding against one server
enum Attempt {
    Bound,
    Rejected,
    Unavailable(Error),
}

/// Keeps one authenticated handle to a directory server
///
/// The manager owns at most one handle. [`init`](Self::init) establishes it,
/// trying the primary server and, when a backup server is configured, the
/// backup once if the first choice is unreachable. Which server last worked is
/// stored in the [`DecisionCache`] so that later cycles go straight to it.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> ldap_failover::Result<()> {
/// use ldap_failover::{ConnectionConfig, ConnectionManager, MemoryDecisionCache, WireBackend};
/// use std::sync::Arc;
///
/// let config = ConnectionConfig::builder("ldap://ldap1.example.com")
///     .backup("ldap://ldap2.example.com", None)
///     .agent("cn=agent,dc=example,dc=com", "secret")
///     .build();
///
/// let cache = Arc::new(MemoryDecisionCache::new());
/// let mut manager = ConnectionManager::new(WireBackend::new(), cache, config);
///
/// if manager.init().await? {
///     println!("bound to {:?}", manager.current_server());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<B: DirectoryBackend, C: DecisionCache> {
    backend: B,
    cache: C,
    config: ConnectionConfig,
    ignore_validation: bool,
    handle: Option<B::Handle>,
    state: ConnectionState,
    current_server: Option<ServerChoice>,
}

impl<B: DirectoryBackend, C: DecisionCache> ConnectionManager<B, C> {
    /// Create a manager without a handle
    pub fn new(backend: B, cache: C, config: ConnectionConfig) -> Self {
        Self {
            backend,
            cache,
            config,
            ignore_validation: false,
            handle: None,
            state: ConnectionState::NoHandle,
            current_server: None,
        }
    }

    /// Ensure a bound handle exists
    ///
    /// Returns `Ok(true)` when bound, `Ok(false)` when the credentials were
    /// rejected or the configuration is inactive. A bound handle is reused
    /// without network activity.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] if validation fails (see [`set_ignore_validation`](Self::set_ignore_validation))
    /// * [`Error::ServerUnavailable`] if StartTLS fails or no server could be reached
    pub async fn init(&mut self) -> Result<bool> {
        if !self.ignore_validation {
            self.config.validate()?;
        }
        if !self.config.active {
            tracing::debug!(host = %self.config.host, "configuration inactive");
            return Ok(false);
        }

        if let Some(handle) = &self.handle {
            if self.backend.is_valid(handle) {
                if self.state == ConnectionState::Bound {
                    return Ok(true);
                }
                return self.bind_current().await;
            }
            tracing::debug!("discarding stale handle");
            self.reset_connection_resource().await;
        }

        let span = tracing::info_span!(
            "ldap_connect",
            host = %self.config.host,
            backup_host = %self.config.backup_host,
        );
        self.connect_cycle().instrument(span).await
    }

    /// Authenticate on the current handle, connecting first if there is none
    ///
    /// Rejected credentials return `Ok(false)`. An already bound handle is
    /// reused without network activity. If the server has gone away, the
    /// handle is dropped and the failover partner is tried once.
    pub async fn bind(&mut self) -> Result<bool> {
        let valid = self
            .handle
            .as_ref()
            .is_some_and(|handle| self.backend.is_valid(handle));
        if !valid {
            return self.init().await;
        }
        if !self.config.active {
            return Ok(false);
        }
        self.bind_current().await
    }

    /// Unbind and drop the handle; the next [`init`](Self::init) reconnects
    pub async fn reset_connection_resource(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.unbind(handle).await;
            tracing::debug!(server = ?self.current_server, "connection resource reset");
        }
        self.state = ConnectionState::NoHandle;
        self.current_server = None;
    }

    /// The bound handle, running [`init`](Self::init) first if needed
    ///
    /// `None` when the configuration is inactive or the credentials were
    /// rejected.
    pub async fn connection_resource(&mut self) -> Result<Option<&mut B::Handle>> {
        if !self.is_bound() {
            self.init().await?;
        }
        Ok(match self.state {
            ConnectionState::Bound => self.handle.as_mut(),
            _ => None,
        })
    }

    /// Replace the configuration and drop the current handle
    pub async fn set_configuration(&mut self, config: ConnectionConfig) {
        self.reset_connection_resource().await;
        self.config = config;
    }

    /// Current configuration
    pub fn configuration(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Skip [`ConnectionConfig::validate`] in [`init`](Self::init)
    pub fn set_ignore_validation(&mut self, ignore: bool) {
        self.ignore_validation = ignore;
    }

    /// Handle lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server the current handle points to
    pub fn current_server(&self) -> Option<ServerChoice> {
        self.current_server
    }

    /// Whether a valid, authenticated handle is held
    pub fn is_bound(&self) -> bool {
        self.state == ConnectionState::Bound
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| self.backend.is_valid(handle))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    async fn connect_cycle(&mut self) -> Result<bool> {
        let failover = self.config.failover_enabled();
        let cached = if failover {
            self.cache.get(OVERRIDE_MAIN_SERVER_KEY)
        } else {
            None
        };
        let first = if failover && (self.config.override_main_server || cached == Some(true)) {
            ServerChoice::Backup
        } else {
            ServerChoice::Primary
        };

        match self.attempt(first).await? {
            Attempt::Bound => {
                self.remember_choice(first, cached);
                Ok(true)
            }
            Attempt::Rejected => Ok(false),
            Attempt::Unavailable(err) if failover => self.fail_over(first, err, cached).await,
            Attempt::Unavailable(err) => Err(err),
        }
    }

    /// Single retry against the partner of the server that just failed
    async fn fail_over(
        &mut self,
        failed: ServerChoice,
        err: Error,
        cached: Option<bool>,
    ) -> Result<bool> {
        let partner = failed.other();
        tracing::warn!(from = %failed, to = %partner, error = %err, "failing over");
        counters::failover_triggered();

        match self.attempt(partner).await? {
            Attempt::Bound => {
                self.remember_choice(partner, cached);
                Ok(true)
            }
            Attempt::Rejected => Ok(false),
            Attempt::Unavailable(err) => {
                tracing::error!(error = %err, "no LDAP server reachable");
                Err(err)
            }
        }
    }

    fn endpoint(&self, server: ServerChoice) -> (String, u16) {
        match server {
            ServerChoice::Primary => (self.config.host.clone(), self.config.port),
            ServerChoice::Backup => (
                self.config.backup_host.clone(),
                self.config.effective_backup_port(),
            ),
        }
    }

    /// Connect, configure, optionally StartTLS, then bind against `server`
    ///
    /// A StartTLS failure, or a connect error that is not a transport
    /// failure (see [`Error::is_server_unavailable`]), is returned as `Err`
    /// and does not trigger failover.
    async fn attempt(&mut self, server: ServerChoice) -> Result<Attempt> {
        let (host, port) = self.endpoint(server);
        let timeout = self.config.timeout;

        self.current_server = Some(server);
        self.state.transition(ConnectionState::Connecting)?;
        counters::connect_attempted(server.label());
        tracing::debug!(%server, host = %host, port, "connecting");

        let mut handle = match self.backend.connect(&host, port, timeout).await {
            Ok(handle) => handle,
            Err(e) => {
                counters::connect_failed(server.label(), labels::REASON_CONNECT);
                self.state.transition(ConnectionState::NoHandle)?;
                if !e.is_server_unavailable() {
                    tracing::warn!(%server, host = %host, error = %e, "connect failed");
                    return Err(e);
                }
                return Ok(Attempt::Unavailable(Error::ServerUnavailable(format!(
                    "cannot connect to LDAP host {}:{}: {}",
                    host, port, e
                ))));
            }
        };

        let options = [
            LdapOption::ProtocolVersion(PROTOCOL_VERSION),
            LdapOption::Referrals(false),
            LdapOption::NetworkTimeout(timeout),
        ];
        for option in options {
            if let Err(e) = self.backend.set_option(&mut handle, option) {
                counters::connect_failed(server.label(), labels::REASON_OPTION);
                self.backend.unbind(handle).await;
                self.state.transition(ConnectionState::NoHandle)?;
                return Ok(Attempt::Unavailable(Error::ServerUnavailable(format!(
                    "cannot set {:?} on LDAP host {}: {}",
                    option, host, e
                ))));
            }
        }

        if self.config.tls_required {
            self.state.transition(ConnectionState::NegotiatingTls)?;
            if let Err(e) = self.backend.start_tls(&mut handle).await {
                tracing::warn!(%server, host = %host, error = %e, "StartTLS failed");
                counters::tls_negotiation_failed(server.label());
                self.backend.unbind(handle).await;
                self.state.transition(ConnectionState::NoHandle)?;
                return Err(Error::ServerUnavailable(format!(
                    "Start TLS failed, when connecting to LDAP host {}.",
                    host
                )));
            }
        }

        self.handle = Some(handle);

        Ok(match self.bind_handle(server).await? {
            BindResult::Bound => Attempt::Bound,
            BindResult::InvalidCredentials => Attempt::Rejected,
            BindResult::ServerUnavailable => Attempt::Unavailable(Error::ServerUnavailable(
                format!("bind failed on LDAP host {}", host),
            )),
        })
    }

    /// Bind on the held handle, trying the partner once if the server is gone
    async fn bind_current(&mut self) -> Result<bool> {
        if self.state == ConnectionState::Bound {
            return Ok(true);
        }

        let server = self.current_server.unwrap_or(ServerChoice::Primary);
        match self.bind_handle(server).await? {
            BindResult::Bound => return Ok(true),
            BindResult::InvalidCredentials => return Ok(false),
            BindResult::ServerUnavailable => {}
        }

        let (host, _) = self.endpoint(server);
        let err = Error::ServerUnavailable(format!("bind failed on LDAP host {}", host));
        if !self.config.failover_enabled() {
            return Err(err);
        }
        let cached = self.cache.get(OVERRIDE_MAIN_SERVER_KEY);
        let span = tracing::info_span!("ldap_reconnect", failed = %server);
        self.fail_over(server, err, cached).instrument(span).await
    }

    /// Send the agent bind and classify the outcome
    ///
    /// A server failure releases the handle.
    async fn bind_handle(&mut self, server: ServerChoice) -> Result<BindResult> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::InvalidState {
                expected: "open handle".into(),
                actual: self.state.to_string(),
            });
        };
        self.state.transition(ConnectionState::Binding)?;

        let started = Instant::now();
        let result = match self
            .backend
            .bind(handle, &self.config.agent_name, &self.config.agent_password)
            .await
        {
            Ok(code) => BindResult::from_code(code),
            Err(e) => {
                tracing::warn!(%server, error = %e, "bind request failed");
                BindResult::ServerUnavailable
            }
        };
        histograms::bind_duration(server.label(), started.elapsed().as_millis() as u64);
        counters::bind_outcome(server.label(), result.label());

        match result {
            BindResult::Bound => {
                self.state.transition(ConnectionState::Bound)?;
                tracing::info!(%server, dn = %self.config.agent_name, "bound");
            }
            BindResult::InvalidCredentials => {
                self.state.transition(ConnectionState::Failed)?;
                tracing::warn!(%server, dn = %self.config.agent_name, "invalid credentials");
            }
            BindResult::ServerUnavailable => {
                if let Some(handle) = self.handle.take() {
                    self.backend.unbind(handle).await;
                }
                self.state.transition(ConnectionState::NoHandle)?;
                self.current_server = None;
            }
        }

        Ok(result)
    }

    /// Store which server worked, unless the cache already says so
    fn remember_choice(&self, used: ServerChoice, cached: Option<bool>) {
        if !self.config.failover_enabled() {
            return;
        }
        let value = used == ServerChoice::Backup;
        if cached.unwrap_or(false) == value {
            return;
        }
        self.cache
            .set(OVERRIDE_MAIN_SERVER_KEY, value, self.config.cache_ttl);
        counters::cache_written(value);
        tracing::debug!(override_main_server = value, ttl = ?self.config.cache_ttl, "server preference cached");
    }
}

/// Clones the configuration, backend and cache; the clone has no handle
impl<B, C> Clone for ConnectionManager<B, C>
where
    B: DirectoryBackend + Clone,
    C: DecisionCache + Clone,
{
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
            ignore_validation: self.ignore_validation,
            handle: None,
            state: ConnectionState::NoHandle,
            current_server: None,
        }
    }
}

impl<B: DirectoryBackend, C: DecisionCache> fmt::Debug for ConnectionManager<B, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("current_server", &self.current_server)
            .field("ignore_validation", &self.ignore_validation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryDecisionCache;
    use crate::protocol::ResultCode;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend whose binds answer from a queue; everything else succeeds
    #[derive(Default)]
    struct QueueBackend {
        binds: Mutex<Vec<ResultCode>>,
        calls: Mutex<Vec<String>>,
    }

    impl QueueBackend {
        fn answering(codes: &[u32]) -> Self {
            let backend = Self::default();
            *backend.binds.lock().unwrap() = codes.iter().rev().map(|c| ResultCode(*c)).collect();
            backend
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Clone for QueueBackend {
        fn clone(&self) -> Self {
            Self {
                binds: Mutex::new(self.binds.lock().unwrap().clone()),
                calls: Mutex::default(),
            }
        }
    }

    impl DirectoryBackend for QueueBackend {
        type Handle = String;

        async fn connect(&self, host: &str, _port: u16, _timeout: Duration) -> Result<String> {
            self.calls.lock().unwrap().push(format!("connect {}", host));
            Ok(host.to_string())
        }

        fn set_option(&self, _handle: &mut String, _option: LdapOption) -> Result<()> {
            Ok(())
        }

        async fn start_tls(&self, _handle: &mut String) -> Result<()> {
            Ok(())
        }

        async fn bind(&self, handle: &mut String, _dn: &str, _password: &str) -> Result<ResultCode> {
            self.calls.lock().unwrap().push(format!("bind {}", handle));
            Ok(self.binds.lock().unwrap().pop().unwrap_or(ResultCode::SUCCESS))
        }

        fn is_valid(&self, _handle: &String) -> bool {
            true
        }

        async fn unbind(&self, handle: String) {
            self.calls.lock().unwrap().push(format!("unbind {}", handle));
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::builder("ldap://nixda.ldap")
            .agent("uid=agent", "SuchASecret")
            .build()
    }

    fn manager(
        backend: QueueBackend,
        config: ConnectionConfig,
    ) -> ConnectionManager<QueueBackend, Arc<MemoryDecisionCache>> {
        ConnectionManager::new(backend, Arc::new(MemoryDecisionCache::new()), config)
    }

    #[tokio::test]
    async fn test_init_binds_once() {
        let mut manager = manager(QueueBackend::answering(&[0]), config());

        assert!(manager.init().await.unwrap());
        assert!(manager.init().await.unwrap());
        assert!(manager.is_bound());
        assert_eq!(manager.state(), ConnectionState::Bound);
        assert_eq!(manager.current_server(), Some(ServerChoice::Primary));
        assert_eq!(
            manager.backend().calls(),
            vec!["connect ldap://nixda.ldap", "bind ldap://nixda.ldap"]
        );
    }

    #[tokio::test]
    async fn test_bind_on_bound_handle_skips_server() {
        let mut manager = manager(QueueBackend::answering(&[0]), config());

        assert!(manager.bind().await.unwrap());
        assert!(manager.bind().await.unwrap());
        assert_eq!(manager.backend().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rebind_after_rejection_reaches_server() {
        let mut manager = manager(QueueBackend::answering(&[49, 0]), config());

        assert!(!manager.bind().await.unwrap());
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(manager.bind().await.unwrap());
        assert_eq!(manager.state(), ConnectionState::Bound);
        assert_eq!(
            manager.backend().calls(),
            vec![
                "connect ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
            ]
        );
    }

    #[tokio::test]
    async fn test_config_change_rebinds() {
        let mut manager = manager(QueueBackend::answering(&[49, 0]), config());

        assert!(!manager.init().await.unwrap());
        let next = manager.configuration().clone();
        let next = ConnectionConfig {
            agent_password: "Corrected".into(),
            ..next
        };
        manager.set_configuration(next).await;
        assert_eq!(manager.state(), ConnectionState::NoHandle);

        assert!(manager.bind().await.unwrap());
        assert_eq!(
            manager.backend().calls(),
            vec![
                "connect ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
                "unbind ldap://nixda.ldap",
                "connect ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
            ]
        );
    }

    #[tokio::test]
    async fn test_rebind_failure_without_backup_does_not_reconnect() {
        let mut manager = manager(QueueBackend::answering(&[49, 52]), config());

        assert!(!manager.init().await.unwrap());
        let err = manager.bind().await.unwrap_err();
        assert!(matches!(err, Error::ServerUnavailable(ref msg) if msg.contains("nixda.ldap")));
        assert_eq!(manager.state(), ConnectionState::NoHandle);
        assert_eq!(
            manager.backend().calls(),
            vec![
                "connect ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
                "bind ldap://nixda.ldap",
                "unbind ldap://nixda.ldap",
            ]
        );
    }

    #[tokio::test]
    async fn test_server_failure_without_backup() {
        let mut manager = manager(QueueBackend::answering(&[52]), config());

        let err = manager.init().await.unwrap_err();
        assert!(matches!(err, Error::ServerUnavailable(ref msg) if msg.contains("nixda.ldap")));
        assert_eq!(manager.state(), ConnectionState::NoHandle);
        assert!(manager.cache().is_empty());
    }

    #[tokio::test]
    async fn test_reset_connection_resource() {
        let mut manager = manager(QueueBackend::answering(&[0, 0]), config());

        assert!(manager.init().await.unwrap());
        manager.reset_connection_resource().await;
        assert_eq!(manager.state(), ConnectionState::NoHandle);
        assert_eq!(manager.current_server(), None);
        assert!(!manager.is_bound());

        assert!(manager.connection_resource().await.unwrap().is_some());
        assert_eq!(manager.backend().calls().len(), 5);
    }

    #[tokio::test]
    async fn test_clone_has_no_handle() {
        let mut manager = manager(QueueBackend::answering(&[0]), config());
        assert!(manager.init().await.unwrap());

        let mut cloned = manager.clone();
        assert_eq!(cloned.state(), ConnectionState::NoHandle);
        assert_eq!(cloned.configuration(), manager.configuration());

        let user = cloned.configuration().apply(&crate::client::ConfigurationRecord {
            agent_name: Some("user".into()),
            agent_password: Some("password".into()),
            ..Default::default()
        });
        cloned.set_configuration(user).await;
        assert_eq!(manager.configuration().agent_name, "uid=agent");
        assert_eq!(manager.configuration().agent_password, "SuchASecret");
        assert!(manager.is_bound());
    }

    #[test]
    fn test_server_choice() {
        assert_eq!(ServerChoice::Primary.other(), ServerChoice::Backup);
        assert_eq!(ServerChoice::Backup.other(), ServerChoice::Primary);
        assert_eq!(ServerChoice::Backup.to_string(), "backup");
    }
}
