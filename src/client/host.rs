//! Directory server address parsing
//!
//! Supports formats:
//! * ldap.example.com (plain LDAP, configured port)
//! * ldap://host[:port]
//! * ldaps://host[:port] (TLS from the first byte)
//! * ldapi://%2Fvar%2Frun%2Fslapd%2Fldapi (Unix socket, percent-encoded path)

use crate::{Error, Result};
use std::path::PathBuf;

/// Default port for `ldap://`
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// Default port for `ldaps://`
pub const DEFAULT_LDAPS_PORT: u16 = 636;

/// URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP, optionally upgraded with StartTLS
    Ldap,
    /// Implicit TLS
    Ldaps,
    /// Unix domain socket
    Ldapi,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ldap => write!(f, "ldap"),
            Self::Ldaps => write!(f, "ldaps"),
            Self::Ldapi => write!(f, "ldapi"),
        }
    }
}

/// Parsed server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapUrl {
    /// Scheme
    pub scheme: Scheme,
    /// Host name (empty for `ldapi://`)
    pub host: String,
    /// Port given in the URL, if any
    pub port: Option<u16>,
    /// Socket path for `ldapi://`
    pub socket_path: Option<PathBuf>,
}

impl LdapUrl {
    /// Parse a configured host value
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("empty LDAP host".into()));
        }

        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = match scheme.to_ascii_lowercase().as_str() {
                    "ldap" => Scheme::Ldap,
                    "ldaps" => Scheme::Ldaps,
                    "ldapi" => Scheme::Ldapi,
                    other => {
                        return Err(Error::Config(format!(
                            "unsupported LDAP URL scheme '{}'",
                            other
                        )))
                    }
                };
                (scheme, rest)
            }
            None => (Scheme::Ldap, s),
        };

        // DN, attributes and filters after the authority are irrelevant here
        let authority = rest.split(['/', '?']).next().unwrap_or_default();

        if scheme == Scheme::Ldapi {
            return Self::parse_ldapi(authority);
        }

        let (host, port) = split_host_port(authority)?;
        if host.is_empty() {
            return Err(Error::Config(format!("no host in LDAP URL '{}'", s)));
        }

        Ok(Self {
            scheme,
            host,
            port,
            socket_path: None,
        })
    }

    fn parse_ldapi(authority: &str) -> Result<Self> {
        let path = if authority.is_empty() {
            PathBuf::from("/var/run/ldapi")
        } else {
            PathBuf::from(percent_decode(authority)?)
        };

        Ok(Self {
            scheme: Scheme::Ldapi,
            host: String::new(),
            port: None,
            socket_path: Some(path),
        })
    }

    /// Port to connect to: the URL's own, else `configured`, else the scheme default
    pub fn effective_port(&self, configured: u16) -> u16 {
        match (self.port, configured) {
            (Some(port), _) => port,
            (None, 0) if self.scheme == Scheme::Ldaps => DEFAULT_LDAPS_PORT,
            (None, 0) => DEFAULT_LDAP_PORT,
            (None, configured) => configured,
        }
    }

    /// Whether the connection is encrypted from the start
    pub fn is_implicit_tls(&self) -> bool {
        self.scheme == Scheme::Ldaps
    }
}

/// Split `host[:port]`, accepting bracketed IPv6 literals
fn split_host_port(authority: &str) -> Result<(String, Option<u16>)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("unterminated IPv6 literal '{}'", authority)))?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(parse_port(port)?),
            None => None,
        };
        return Ok((host.to_string(), port));
    }

    if authority.matches(':').count() > 1 {
        return Err(Error::Config(format!(
            "IPv6 literal '{}' must be enclosed in brackets",
            authority
        )));
    }

    match authority.split_once(':') {
        Some((host, port)) => Ok((host.to_string(), Some(parse_port(port)?))),
        None => Ok((authority.to_string(), None)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| Error::Config(format!("invalid port '{}'", port)))
}

fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::Config(format!("invalid percent-encoding in '{}'", s)))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::Config(format!("invalid UTF-8 in '{}'", s)))
}
