//! LDAPv3 wire protocol
//!
//! Only the operations the connection manager needs are implemented:
//! * Simple bind
//! * StartTLS (extended operation)
//! * Unbind

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::decode_message;
pub use encode::encode_message;
pub use message::{LdapRequest, LdapResponse, LdapResult, ResponseOp, ResultCode};
