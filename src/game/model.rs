use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::PeerId;

/// Team identity as carried on the wire. Unassigned is the empty string.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TeamId {
    #[default]
    #[serde(rename = "")]
    Unassigned,
    #[serde(rename = "teamBlue")]
    Blue,
    #[serde(rename = "teamRed")]
    Red,
}

impl TeamId {
    /// The opposing team.
    ///
    /// Anything that is not blue maps to blue, so an unassigned player
    /// resolving team logic lands on blue.
    pub fn other(self) -> TeamId {
        match self {
            TeamId::Blue => TeamId::Red,
            _ => TeamId::Blue,
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamId::Unassigned => write!(f, "unassigned"),
            TeamId::Blue => write!(f, "teamBlue"),
            TeamId::Red => write!(f, "teamRed"),
        }
    }
}

/// Ownership printed on the hidden side of a card.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardTeam {
    #[serde(rename = "teamBlue")]
    Blue,
    #[serde(rename = "teamRed")]
    Red,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "dead")]
    Dead,
}

impl CardTeam {
    /// Whether this card scores for the given team.
    pub fn belongs_to(self, team: TeamId) -> bool {
        matches!(
            (self, team),
            (CardTeam::Blue, TeamId::Blue) | (CardTeam::Red, TeamId::Red)
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PeerId,
    pub name: String,
    pub team_id: TeamId,
    pub is_game_master: bool,
}

impl Player {
    /// The record a peer announces before it has picked a team.
    pub fn unassigned(id: PeerId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            team_id: TeamId::Unassigned,
            is_game_master: false,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: TeamId,
    pub nb_try_left: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageCard {
    pub image_id: String,
    pub image_team: CardTeam,
    /// Unassigned while the card is face down.
    pub flipped_by_team: TeamId,
    pub is_hint: bool,
    /// Board position, fixed at deal time.
    pub index: usize,
}

impl ImageCard {
    pub fn is_unflipped(&self) -> bool {
        self.flipped_by_team == TeamId::Unassigned
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Finished,
}

/// The aggregate root.
///
/// Owned and mutated exclusively by the host process; every other
/// participant holds a mirror replaced wholesale on each snapshot. The card
/// set size and per-team composition are fixed for the lifetime of one
/// round: only `flipped_by_team` and `is_hint` mutate during play.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// The host's peer identity doubles as the room identity.
    pub room_id: Option<PeerId>,
    pub game_status: GameStatus,
    pub teams: HashMap<TeamId, Team>,
    pub players: HashMap<PeerId, Player>,
    pub team_playing: TeamId,
    pub images: HashMap<String, ImageCard>,
    pub winner: TeamId,
}

impl Game {
    /// An empty waiting room.
    pub fn new(room_id: Option<PeerId>) -> Self {
        Self {
            room_id,
            game_status: GameStatus::Waiting,
            teams: HashMap::new(),
            players: HashMap::new(),
            team_playing: TeamId::Unassigned,
            images: HashMap::new(),
            winner: TeamId::Unassigned,
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(None)
    }
}
