use std::time::Duration;

use crate::game::Game;
use crate::session::PeerId;

/// What a room reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// The local view of the game changed.
    GameUpdated(Game),
    /// Host side: a client channel opened.
    PeerJoined(PeerId),
    /// Host side: a client channel closed or timed out.
    PeerLeft(PeerId),
    /// Host side: a fresh round-trip measurement for one client.
    LatencyUpdated { peer: PeerId, rtt: Duration },
    /// Client side: the host is gone. The room has reset to an empty local
    /// lobby with this peer as its host.
    HostDisconnected,
    /// A request was rejected or something recoverable went wrong.
    Error(String),
}
