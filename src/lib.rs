//! Host-authoritative p2p state synchronization for a real-time multiplayer
//! card game.
//!
//! One peer hosts a room and owns the single authoritative [`Game`]
//! aggregate; every joining peer opens exactly one channel to the host and
//! mirrors the aggregate through full-state snapshots. A ping/pong liveness
//! protocol embedded in each channel detects silent peer death, which p2p
//! links routinely fail to report as a transport close.

mod error;
mod game;
mod liveness;
mod protocol;
mod registry;
mod room;
mod session;

pub use error::GameError;
pub use game::deck;
pub use game::{CardTeam, Game, GameStatus, ImageCard, Player, Team, TeamId};
pub use liveness::LivenessConfig;
pub use protocol::Envelope;
pub use room::{GameRoom, RoomEvent};
pub use session::PeerId;
