//! The authoritative game state machine.
//!
//! Everything in here is synchronous and host-local: the room actor is the
//! only mutator, clients hold read-only mirrors replaced wholesale.

pub mod deck;
mod engine;
mod model;

pub use model::{CardTeam, Game, GameStatus, ImageCard, Player, Team, TeamId};
