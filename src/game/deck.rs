//! Board dealing: draw a random subset of the card pool and assign team
//! ownership to each position.

use rand::seq::SliceRandom;

use crate::error::GameError;
use crate::game::model::{CardTeam, ImageCard, TeamId};

/// How many cards of each kind go on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckComposition {
    pub blue: usize,
    pub red: usize,
    pub neutral: usize,
    pub dead: usize,
}

impl Default for DeckComposition {
    /// The standard 16-card board. Blue carries one extra card because blue
    /// plays first.
    fn default() -> Self {
        Self {
            blue: 7,
            red: 6,
            neutral: 2,
            dead: 1,
        }
    }
}

impl DeckComposition {
    pub fn total(&self) -> usize {
        self.blue + self.red + self.neutral + self.dead
    }
}

/// Identifiers of every card art asset shipped with the game.
const CARD_POOL: [&str; 30] = [
    "anchor", "balloon", "bell", "bicycle", "bridge", "cactus", "camera", "candle", "castle",
    "clock", "compass", "crown", "dragon", "feather", "glasses", "hammer", "kite", "ladder",
    "lantern", "lighthouse", "mirror", "mountain", "mushroom", "padlock", "rocket", "telescope",
    "tent", "umbrella", "violin", "windmill",
];

/// Deal one board: distinct random cards, shuffled team assignment, stable
/// board indices.
pub fn generate(composition: &DeckComposition) -> Result<Vec<ImageCard>, GameError> {
    let needed = composition.total();
    if needed > CARD_POOL.len() {
        return Err(GameError::DeckExhausted {
            needed,
            available: CARD_POOL.len(),
        });
    }

    let mut rng = rand::rng();
    let mut pool = CARD_POOL.to_vec();
    pool.shuffle(&mut rng);

    let mut kinds: Vec<CardTeam> = Vec::with_capacity(needed);
    kinds.extend(std::iter::repeat_n(CardTeam::Blue, composition.blue));
    kinds.extend(std::iter::repeat_n(CardTeam::Red, composition.red));
    kinds.extend(std::iter::repeat_n(CardTeam::Neutral, composition.neutral));
    kinds.extend(std::iter::repeat_n(CardTeam::Dead, composition.dead));
    kinds.shuffle(&mut rng);

    Ok(pool
        .into_iter()
        .take(needed)
        .zip(kinds)
        .enumerate()
        .map(|(index, (image_id, image_team))| ImageCard {
            image_id: image_id.to_string(),
            image_team,
            flipped_by_team: TeamId::Unassigned,
            is_hint: false,
            index,
        })
        .collect())
}
