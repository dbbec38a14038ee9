//! Connection registry: which peers have an open channel, and which side of
//! the protocol this process plays.

use std::collections::HashMap;

use thiserror::Error;

use crate::protocol::Envelope;
use crate::session::{Channel, PeerId};

/// Which side of the protocol this process plays. Fixed at construction and
/// never changes for the life of the room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Role {
    #[default]
    Unset,
    Host,
    Client,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum RegistryError {
    #[error("role is already fixed and cannot change")]
    RoleFixed,
    #[error("peer already has an open channel")]
    AlreadyConnected,
    #[error("a client holds exactly one channel, to the host")]
    ClientAcceptsNone,
}

/// Channel bookkeeping, owned by the room actor.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    role: Role,
    channels: HashMap<PeerId, Channel>,
}

impl ConnectionRegistry {
    /// Fix the role once. Setting the same role again is a no-op.
    pub(crate) fn fix_role(&mut self, role: Role) -> Result<(), RegistryError> {
        if self.role == Role::Unset || self.role == role {
            self.role = role;
            Ok(())
        } else {
            Err(RegistryError::RoleFixed)
        }
    }

    pub(crate) fn am_i_host(&self) -> bool {
        self.role == Role::Host
    }

    pub(crate) fn is_connected(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Admit a freshly opened channel.
    pub(crate) fn register(&mut self, channel: Channel) -> Result<(), RegistryError> {
        if self.role == Role::Client && !self.channels.is_empty() {
            return Err(RegistryError::ClientAcceptsNone);
        }
        if self.channels.contains_key(&channel.remote) {
            return Err(RegistryError::AlreadyConnected);
        }
        self.channels.insert(channel.remote, channel);
        Ok(())
    }

    pub(crate) fn remove(&mut self, peer: &PeerId) -> Option<Channel> {
        self.channels.remove(peer)
    }

    pub(crate) fn get(&self, peer: &PeerId) -> Option<&Channel> {
        self.channels.get(peer)
    }

    /// A client's single channel, if connected.
    pub(crate) fn host_channel(&self) -> Option<&Channel> {
        self.channels.values().next()
    }

    /// Best-effort fan-out to every open channel.
    pub(crate) fn broadcast(&self, envelope: &Envelope) {
        for channel in self.channels.values() {
            channel.send(envelope.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_peer_id;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn channel(remote: PeerId) -> Channel {
        let (tx, _rx) = mpsc::channel(4);
        Channel::new(remote, tx, CancellationToken::new())
    }

    #[test]
    fn role_fixes_once() {
        let mut registry = ConnectionRegistry::default();
        registry.fix_role(Role::Host).unwrap();
        registry.fix_role(Role::Host).unwrap();
        assert_eq!(registry.fix_role(Role::Client), Err(RegistryError::RoleFixed));
        assert!(registry.am_i_host());
    }

    #[test]
    fn client_holds_one_channel_only() {
        let mut registry = ConnectionRegistry::default();
        registry.fix_role(Role::Client).unwrap();
        registry.register(channel(test_peer_id())).unwrap();
        assert_eq!(
            registry.register(channel(test_peer_id())),
            Err(RegistryError::ClientAcceptsNone)
        );
        assert!(registry.host_channel().is_some());
    }

    #[test]
    fn duplicate_peer_is_rejected() {
        let mut registry = ConnectionRegistry::default();
        registry.fix_role(Role::Host).unwrap();
        let peer = test_peer_id();
        registry.register(channel(peer)).unwrap();
        assert_eq!(
            registry.register(channel(peer)),
            Err(RegistryError::AlreadyConnected)
        );
        assert!(registry.is_connected());
        registry.remove(&peer);
        assert!(!registry.is_connected());
    }
}
