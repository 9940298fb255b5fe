//! Bind outcome classification

use crate::metrics::labels;
use crate::protocol::ResultCode;

/// Outcome of one bind attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindResult {
    /// Server accepted the credentials
    Bound,
    /// Server rejected the credentials; retrying elsewhere will not help
    InvalidCredentials,
    /// Server could not process the bind
    ServerUnavailable,
}

impl BindResult {
    /// Classify a bind result code
    ///
    /// `invalidCredentials` (49) and `insufficientAccessRights` (50) are
    /// credential problems. Any other non-zero code counts against the server.
    pub fn from_code(code: ResultCode) -> Self {
        match code {
            ResultCode::SUCCESS => Self::Bound,
            ResultCode::INVALID_CREDENTIALS | ResultCode::INSUFFICIENT_ACCESS_RIGHTS => {
                Self::InvalidCredentials
            }
            _ => Self::ServerUnavailable,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Bound => labels::OUTCOME_BOUND,
            Self::InvalidCredentials => labels::OUTCOME_INVALID_CREDENTIALS,
            Self::ServerUnavailable => labels::OUTCOME_SERVER_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(BindResult::from_code(ResultCode(0)), BindResult::Bound);
        assert_eq!(
            BindResult::from_code(ResultCode(0x31)),
            BindResult::InvalidCredentials
        );
        assert_eq!(
            BindResult::from_code(ResultCode(50)),
            BindResult::InvalidCredentials
        );
        assert_eq!(
            BindResult::from_code(ResultCode(52)),
            BindResult::ServerUnavailable
        );
        assert_eq!(
            BindResult::from_code(ResultCode(-1i32 as u32)),
            BindResult::ServerUnavailable
        );
    }
}
