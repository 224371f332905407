//! Which end of the connection this endpoint is.

use crate::protocol::generate_mask;

/// WebSocket connection role.
///
/// Decides masking in both directions (RFC 6455 Section 5.1): clients mask
/// what they send, servers require masked input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Client,
    #[default]
    Server,
}

impl Role {
    /// Outgoing frames must carry a masking key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Incoming frames must carry a masking key.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// Masking key for the next outgoing frame, if this role masks.
    #[must_use]
    pub fn outgoing_mask(&self) -> Option<[u8; 4]> {
        self.must_mask().then(generate_mask)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_rules() {
        assert!(Role::Client.must_mask());
        assert!(!Role::Client.expects_masked());
        assert!(!Role::Server.must_mask());
        assert!(Role::Server.expects_masked());
    }

    #[test]
    fn test_outgoing_mask() {
        assert!(Role::Client.outgoing_mask().is_some());
        assert!(Role::Server.outgoing_mask().is_none());
    }

    #[test]
    fn test_default_is_server() {
        assert_eq!(Role::default(), Role::Server);
        assert_eq!(Role::Server.to_string(), "server");
    }
}
