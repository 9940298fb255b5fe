//! Connection configuration
//!
//! [`ConnectionConfig`] is an immutable snapshot held by the manager. It is
//! built with [`ConnectionConfig::builder`] or derived from an inbound
//! [`ConfigurationRecord`], and replaced wholesale when settings change.

use super::host::{LdapUrl, Scheme};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 389;

/// Connect and network timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifetime of the server preference in the decision cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Directory connection settings
///
/// Cloning yields an independent copy.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Primary server, bare host or `ldap[s|i]://` URL
    pub host: String,
    /// Primary port
    pub port: u16,
    /// Backup server; empty disables failover
    pub backup_host: String,
    /// Backup port, defaults to the primary port
    pub backup_port: Option<u16>,
    /// Bind DN of the service account
    pub agent_name: String,
    /// Password of the service account
    pub agent_password: String,
    /// Upgrade with StartTLS before binding
    pub tls_required: bool,
    /// Connect timeout, also applied as the network timeout
    pub timeout: Duration,
    /// Inactive configurations never touch the network
    pub active: bool,
    /// Try the backup server first regardless of the decision cache
    pub override_main_server: bool,
    /// How long a successful server choice is remembered
    pub cache_ttl: Duration,
}

impl ConnectionConfig {
    /// Create configuration for `host` with defaults
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```
    /// use ldap_failover::ConnectionConfig;
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfig::builder("ldap://ldap1.example.com")
    ///     .backup("ldap://ldap2.example.com", None)
    ///     .agent("cn=agent,dc=example,dc=com", "secret")
    ///     .tls_required(true)
    ///     .timeout(Duration::from_secs(5))
    ///     .build();
    /// assert!(config.failover_enabled());
    /// ```
    pub fn builder(host: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: ConnectionConfig {
                host: host.into(),
                ..Self::default()
            },
        }
    }

    /// Parse a JSON [`ConfigurationRecord`] over the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let record: ConfigurationRecord = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid configuration record: {}", e)))?;
        Ok(Self::default().apply(&record))
    }

    /// Whether a backup server is configured
    pub fn failover_enabled(&self) -> bool {
        !self.backup_host.trim().is_empty()
    }

    /// Backup port, falling back to the primary port
    pub fn effective_backup_port(&self) -> u16 {
        match self.backup_port {
            Some(port) if port != 0 => port,
            _ => self.port,
        }
    }

    /// New snapshot with every field present in `record` replaced
    pub fn apply(&self, record: &ConfigurationRecord) -> Self {
        let mut next = self.clone();
        if let Some(host) = &record.host {
            next.host = host.clone();
        }
        if let Some(port) = record.port {
            next.port = port;
        }
        if let Some(backup_host) = &record.backup_host {
            next.backup_host = backup_host.clone();
        }
        if let Some(backup_port) = record.backup_port {
            next.backup_port = (backup_port != 0).then_some(backup_port);
        }
        if let Some(agent_name) = &record.agent_name {
            next.agent_name = agent_name.clone();
        }
        if let Some(agent_password) = &record.agent_password {
            next.agent_password = agent_password.clone();
        }
        if let Some(tls_required) = record.tls_required {
            next.tls_required = tls_required;
        }
        if let Some(secs) = record.timeout_seconds {
            next.timeout = Duration::from_secs(secs);
        }
        if let Some(active) = record.active {
            next.active = active;
        }
        if let Some(override_main_server) = record.override_main_server {
            next.override_main_server = override_main_server;
        }
        if let Some(secs) = record.cache_ttl_seconds {
            next.cache_ttl = Duration::from_secs(secs);
        }
        next
    }

    /// Check the settings before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("no LDAP host configured".into()));
        }

        let primary = LdapUrl::parse(&self.host)?;
        let backup = if self.failover_enabled() {
            Some(LdapUrl::parse(&self.backup_host)?)
        } else {
            None
        };

        if self.agent_name.is_empty() != self.agent_password.is_empty() {
            return Err(Error::Config(
                "agent name and agent password must be set together; leave both empty for anonymous bind"
                    .into(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        if self.tls_required {
            for url in std::iter::once(&primary).chain(backup.as_ref()) {
                if url.scheme == Scheme::Ldaps {
                    return Err(Error::Config(format!(
                        "StartTLS cannot be combined with ldaps:// (host {})",
                        url.host
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            backup_host: String::new(),
            backup_port: None,
            agent_name: String::new(),
            agent_password: String::new(),
            tls_required: false,
            timeout: DEFAULT_TIMEOUT,
            active: true,
            override_main_server: false,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.agent_password.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backup_host", &self.backup_host)
            .field("backup_port", &self.backup_port)
            .field("agent_name", &self.agent_name)
            .field("agent_password", &password)
            .field("tls_required", &self.tls_required)
            .field("timeout", &self.timeout)
            .field("active", &self.active)
            .field("override_main_server", &self.override_main_server)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Builder for [`ConnectionConfig`]
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the primary port
    ///
    /// Default: 389
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the backup server
    ///
    /// `port` of `None` reuses the primary port.
    pub fn backup(mut self, host: impl Into<String>, port: Option<u16>) -> Self {
        self.config.backup_host = host.into();
        self.config.backup_port = port;
        self
    }

    /// Set the service account used for binding
    pub fn agent(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.agent_name = name.into();
        self.config.agent_password = password.into();
        self
    }

    /// Require StartTLS before bind
    pub fn tls_required(mut self, required: bool) -> Self {
        self.config.tls_required = required;
        self
    }

    /// Set the connect and network timeout
    ///
    /// Default: 15 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Enable or disable the configuration
    ///
    /// Default: active
    pub fn active(mut self, active: bool) -> Self {
        self.config.active = active;
        self
    }

    /// Always try the backup server first
    pub fn override_main_server(mut self, enabled: bool) -> Self {
        self.config.override_main_server = enabled;
        self
    }

    /// Set how long the server preference is cached
    ///
    /// Default: 600 seconds
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Inbound configuration record
///
/// Every field is optional; absent fields leave the current value untouched
/// when applied with [`ConnectionConfig::apply`]. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_main_server: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::new("ldap://nixda.ldap");
        assert_eq!(config.port, 389);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert!(config.active);
        assert!(!config.failover_enabled());
        assert_eq!(config.effective_backup_port(), 389);
    }

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::builder("ldap://nixda.ldap")
            .port(10389)
            .backup("ldap://fallback.ldap", Some(20389))
            .agent("uid=agent", "SuchASecret")
            .tls_required(true)
            .timeout(Duration::from_secs(3))
            .override_main_server(true)
            .cache_ttl(Duration::from_secs(60))
            .build();

        assert!(config.failover_enabled());
        assert_eq!(config.effective_backup_port(), 20389);
        assert_eq!(config.agent_name, "uid=agent");
        assert!(config.tls_required);
        assert!(config.override_main_server);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backup_port_defaults_to_primary() {
        let config = ConnectionConfig::builder("ldap://nixda.ldap")
            .port(1389)
            .backup("ldap://fallback.ldap", None)
            .build();
        assert_eq!(config.effective_backup_port(), 1389);
    }

    #[test]
    fn test_blank_backup_disables_failover() {
        let config = ConnectionConfig::builder("ldap://nixda.ldap")
            .backup("  ", None)
            .build();
        assert!(!config.failover_enabled());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::builder("ldap://nixda.ldap")
            .agent("uid=agent", "SuchASecret")
            .build();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("SuchASecret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("uid=agent"));
    }

    #[test]
    fn test_apply_partial_record() {
        let config = ConnectionConfig::builder("ldap://nixda.ldap")
            .agent("agent", "123456")
            .build();
        let record = ConfigurationRecord {
            agent_name: Some("user".into()),
            agent_password: Some("password".into()),
            ..Default::default()
        };

        let next = config.apply(&record);
        assert_eq!(next.agent_name, "user");
        assert_eq!(next.agent_password, "password");
        assert_eq!(next.host, "ldap://nixda.ldap");

        // source snapshot is untouched
        assert_eq!(config.agent_name, "agent");
        assert_eq!(config.agent_password, "123456");
    }

    #[test]
    fn test_from_json() {
        let config = ConnectionConfig::from_json(
            r#"{
                "host": "ldap://nixda.ldap",
                "port": 389,
                "backupHost": "ldap://fallback.ldap",
                "backupPort": 0,
                "agentName": "uid=agent",
                "agentPassword": "SuchASecret",
                "tlsRequired": false,
                "timeoutSeconds": 5,
                "active": true,
                "cacheTtlSeconds": 30,
                "someOtherSetting": "ignored"
            }"#,
        )
        .unwrap();

        assert_eq!(config.backup_host, "ldap://fallback.ldap");
        assert_eq!(config.backup_port, None);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = ConnectionConfig::from_json(r#"{"port": "not a number"}"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_validate_missing_host() {
        let err = ConnectionConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("no LDAP host"));
    }

    #[test]
    fn test_validate_agent_pairing() {
        let name_only = ConnectionConfig::builder("ldap://nixda.ldap")
            .agent("uid=agent", "")
            .build();
        assert!(name_only.validate().unwrap_err().is_config());

        let password_only = ConnectionConfig::builder("ldap://nixda.ldap")
            .agent("", "secret")
            .build();
        assert!(password_only.validate().is_err());

        let anonymous = ConnectionConfig::new("ldap://nixda.ldap");
        assert!(anonymous.validate().is_ok());
    }

    #[test]
    fn test_validate_ldaps_with_starttls() {
        let config = ConnectionConfig::builder("ldaps://nixda.ldap")
            .tls_required(true)
            .build();
        assert!(config.validate().is_err());

        let backup = ConnectionConfig::builder("ldap://nixda.ldap")
            .backup("ldaps://fallback.ldap", None)
            .tls_required(true)
            .build();
        let err = backup.validate().unwrap_err();
        assert!(err.to_string().contains("fallback.ldap"));
    }

    #[test]
    fn test_validate_bad_url_and_timeout() {
        assert!(ConnectionConfig::new("http://nixda.ldap").validate().is_err());

        let zero = ConnectionConfig::builder("ldap://nixda.ldap")
            .timeout(Duration::ZERO)
            .build();
        assert!(zero.validate().is_err());
    }
}
