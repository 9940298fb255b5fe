//! LDAPv3 protocol constants (RFC 4511)

/// Protocol version 3
pub const PROTOCOL_VERSION: u8 = 3;

/// StartTLS extended operation OID
pub const OID_START_TLS: &str = "1.3.6.1.4.1.1466.20037";

/// Notice of Disconnection unsolicited notification OID
pub const OID_NOTICE_OF_DISCONNECTION: &str = "1.3.6.1.4.1.1466.20036";

/// Universal BER tags
pub mod universal {
    /// BOOLEAN
    pub const BOOLEAN: u8 = 0x01;

    /// INTEGER
    pub const INTEGER: u8 = 0x02;

    /// OCTET STRING
    pub const OCTET_STRING: u8 = 0x04;

    /// ENUMERATED
    pub const ENUMERATED: u8 = 0x0A;

    /// SEQUENCE (constructed)
    pub const SEQUENCE: u8 = 0x30;
}

/// Protocol operation tags (APPLICATION class)
pub mod tags {
    /// BindRequest, [APPLICATION 0] constructed
    pub const BIND_REQUEST: u8 = 0x60;

    /// BindResponse, [APPLICATION 1] constructed
    pub const BIND_RESPONSE: u8 = 0x61;

    /// UnbindRequest, [APPLICATION 2] primitive NULL
    pub const UNBIND_REQUEST: u8 = 0x42;

    /// ExtendedRequest, [APPLICATION 23] constructed
    pub const EXTENDED_REQUEST: u8 = 0x77;

    /// ExtendedResponse, [APPLICATION 24] constructed
    pub const EXTENDED_RESPONSE: u8 = 0x78;
}

/// Context-specific tags used inside operations
pub mod context {
    /// Simple authentication choice in BindRequest, [0] primitive
    pub const AUTH_SIMPLE: u8 = 0x80;

    /// requestName in ExtendedRequest, [0] primitive
    pub const EXTENDED_REQUEST_NAME: u8 = 0x80;

    /// Referral in LDAPResult, [3] constructed
    pub const REFERRAL: u8 = 0xA3;

    /// serverSaslCreds in BindResponse, [7] primitive
    pub const SERVER_SASL_CREDS: u8 = 0x87;

    /// responseName in ExtendedResponse, [10] primitive
    pub const EXTENDED_RESPONSE_NAME: u8 = 0x8A;

    /// responseValue in ExtendedResponse, [11] primitive
    pub const EXTENDED_RESPONSE_VALUE: u8 = 0x8B;

    /// Controls on an LDAPMessage, [0] constructed
    pub const CONTROLS: u8 = 0xA0;
}

/// LDAP result codes
pub mod result_code {
    /// success
    pub const SUCCESS: u32 = 0;

    /// operationsError
    pub const OPERATIONS_ERROR: u32 = 1;

    /// protocolError
    pub const PROTOCOL_ERROR: u32 = 2;

    /// timeLimitExceeded
    pub const TIME_LIMIT_EXCEEDED: u32 = 3;

    /// authMethodNotSupported
    pub const AUTH_METHOD_NOT_SUPPORTED: u32 = 7;

    /// strongerAuthRequired
    pub const STRONGER_AUTH_REQUIRED: u32 = 8;

    /// confidentialityRequired
    pub const CONFIDENTIALITY_REQUIRED: u32 = 13;

    /// invalidCredentials
    pub const INVALID_CREDENTIALS: u32 = 49;

    /// insufficientAccessRights
    pub const INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;

    /// busy
    pub const BUSY: u32 = 51;

    /// unavailable
    pub const UNAVAILABLE: u32 = 52;

    /// unwillingToPerform
    pub const UNWILLING_TO_PERFORM: u32 = 53;

    /// other
    pub const OTHER: u32 = 80;
}
