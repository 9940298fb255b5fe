//! Protocol message types

use super::constants::result_code;

/// Request (client → server)
#[derive(Debug, Clone)]
pub enum LdapRequest {
    /// Simple bind
    SimpleBind {
        /// Protocol version
        version: u8,
        /// Bind DN (empty for anonymous)
        name: String,
        /// Password (empty for anonymous)
        password: String,
    },

    /// Extended operation identified by OID
    Extended {
        /// requestName OID
        name: String,
    },

    /// Unbind (no response)
    Unbind,
}

impl LdapRequest {
    /// StartTLS extended request
    pub fn start_tls() -> Self {
        LdapRequest::Extended {
            name: super::constants::OID_START_TLS.to_string(),
        }
    }
}

/// Response (server → client) with its message ID
#[derive(Debug, Clone)]
pub struct LdapResponse {
    /// Message ID echoed by the server (0 for unsolicited notifications)
    pub message_id: i32,
    /// Protocol operation
    pub op: ResponseOp,
}

/// Response protocol operation
#[derive(Debug, Clone)]
pub enum ResponseOp {
    /// BindResponse
    Bind(LdapResult),

    /// ExtendedResponse
    Extended {
        /// Result
        result: LdapResult,
        /// responseName OID, if present
        name: Option<String>,
    },
}

impl ResponseOp {
    /// LDAPResult carried by this operation
    pub fn result(&self) -> &LdapResult {
        match self {
            ResponseOp::Bind(result) => result,
            ResponseOp::Extended { result, .. } => result,
        }
    }
}

/// LDAP result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// success
    pub const SUCCESS: ResultCode = ResultCode(result_code::SUCCESS);
    /// invalidCredentials
    pub const INVALID_CREDENTIALS: ResultCode = ResultCode(result_code::INVALID_CREDENTIALS);
    /// insufficientAccessRights
    pub const INSUFFICIENT_ACCESS_RIGHTS: ResultCode =
        ResultCode(result_code::INSUFFICIENT_ACCESS_RIGHTS);
    /// unavailable
    pub const UNAVAILABLE: ResultCode = ResultCode(result_code::UNAVAILABLE);

    /// Whether this is `success`
    pub fn is_success(&self) -> bool {
        self.0 == result_code::SUCCESS
    }

    /// Symbolic name from RFC 4511, if known
    pub fn name(&self) -> &'static str {
        match self.0 {
            result_code::SUCCESS => "success",
            result_code::OPERATIONS_ERROR => "operationsError",
            result_code::PROTOCOL_ERROR => "protocolError",
            result_code::TIME_LIMIT_EXCEEDED => "timeLimitExceeded",
            result_code::AUTH_METHOD_NOT_SUPPORTED => "authMethodNotSupported",
            result_code::STRONGER_AUTH_REQUIRED => "strongerAuthRequired",
            result_code::CONFIDENTIALITY_REQUIRED => "confidentialityRequired",
            result_code::INVALID_CREDENTIALS => "invalidCredentials",
            result_code::INSUFFICIENT_ACCESS_RIGHTS => "insufficientAccessRights",
            result_code::BUSY => "busy",
            result_code::UNAVAILABLE => "unavailable",
            result_code::UNWILLING_TO_PERFORM => "unwillingToPerform",
            result_code::OTHER => "other",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// LDAPResult components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapResult {
    /// Result code
    pub code: ResultCode,
    /// Matched DN
    pub matched_dn: String,
    /// Diagnostic message from the server
    pub diagnostic: String,
}

impl std::fmt::Display for LdapResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.diagnostic.is_empty() {
            write!(f, ": {}", self.diagnostic)?;
        }
        Ok(())
    }
}
