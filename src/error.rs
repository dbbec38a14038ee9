use thiserror::Error;

use crate::game::TeamId;

/// Rejected game engine operations.
///
/// These indicate a logic bug or a host/client desync, unlike transport
/// failures which are absorbed into membership-change events and never reach
/// the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("game is not in progress")]
    NotPlaying,
    #[error("only the host can do that")]
    NotHost,
    #[error("unknown team '{0}'")]
    UnknownTeam(TeamId),
    #[error("unknown image '{0}'")]
    UnknownImage(String),
    #[error("this session has no player in the game")]
    UnknownPlayer,
    #[error("deck needs {needed} cards but the pool holds {available}")]
    DeckExhausted { needed: usize, available: usize },
}
