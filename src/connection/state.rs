//! Connection state machine

use crate::{Error, Result};

/// Lifecycle of the transport handle owned by a connection manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle (initial, or after a reset)
    #[default]
    NoHandle,

    /// Opening the transport and applying protocol options
    Connecting,

    /// StartTLS in progress
    NegotiatingTls,

    /// Bind request in flight
    Binding,

    /// Handle open and authenticated as the agent
    Bound,

    /// Handle open but the server rejected the credentials
    Failed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (NoHandle, Connecting)
                | (Connecting, NegotiatingTls)
                | (Connecting, Binding)
                | (NegotiatingTls, Binding)
                | (Binding, Bound)
                | (Binding, Failed)
                | (Bound, Binding)
                | (Failed, Binding)
                | (_, NoHandle)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHandle => write!(f, "no_handle"),
            Self::Connecting => write!(f, "connecting"),
            Self::NegotiatingTls => write!(f, "negotiating_tls"),
            Self::Binding => write!(f, "binding"),
            Self::Bound => write!(f, "bound"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::NoHandle;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::Binding).is_ok());
        assert!(state.transition(ConnectionState::Bound).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::NoHandle;
        assert!(state.transition(ConnectionState::Bound).is_err());
        assert_eq!(state, ConnectionState::NoHandle);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut state = ConnectionState::NegotiatingTls;
        assert!(state.transition(ConnectionState::NoHandle).is_ok());
    }

    #[test]
    fn test_tls_negotiation_transitions() {
        let mut state = ConnectionState::NoHandle;
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::NegotiatingTls).is_ok());
        assert!(state.transition(ConnectionState::Binding).is_ok());
    }

    #[test]
    fn test_rebind_after_rejection() {
        let mut state = ConnectionState::Failed;
        assert!(state.transition(ConnectionState::Binding).is_ok());
        assert!(state.transition(ConnectionState::Bound).is_ok());
        assert!(state.transition(ConnectionState::Binding).is_ok());
    }

    #[test]
    fn test_invalid_tls_transition() {
        let mut state = ConnectionState::Bound;
        assert!(state.transition(ConnectionState::NegotiatingTls).is_err());
    }
}
