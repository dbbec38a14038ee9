//! Shared builders for the integration tests: hand-built boards with a
//! known layout, so rule outcomes are deterministic.

#![allow(dead_code)]

use std::collections::HashMap;

use p2p_card_room::{CardTeam, Game, GameStatus, ImageCard, PeerId, Player, Team, TeamId};

pub fn peer() -> PeerId {
    iroh::SecretKey::generate(&mut rand::rng()).public()
}

pub fn player(team: TeamId) -> Player {
    Player {
        team_id: team,
        ..Player::unassigned(peer(), "tester")
    }
}

pub fn card(image_id: &str, image_team: CardTeam, index: usize) -> ImageCard {
    ImageCard {
        image_id: image_id.to_string(),
        image_team,
        flipped_by_team: TeamId::Unassigned,
        is_hint: false,
        index,
    }
}

/// A playing game over an explicit board layout.
pub fn playing_game(cards: Vec<ImageCard>) -> Game {
    playing_game_with_tries(cards, 5, 6)
}

pub fn playing_game_with_tries(cards: Vec<ImageCard>, blue_tries: u32, red_tries: u32) -> Game {
    let mut game = Game::new(Some(peer()));
    game.images = cards
        .into_iter()
        .map(|card| (card.image_id.clone(), card))
        .collect();
    game.teams = HashMap::from([
        (
            TeamId::Blue,
            Team {
                team_id: TeamId::Blue,
                nb_try_left: blue_tries,
            },
        ),
        (
            TeamId::Red,
            Team {
                team_id: TeamId::Red,
                nb_try_left: red_tries,
            },
        ),
    ]);
    game.team_playing = TeamId::Blue;
    game.game_status = GameStatus::Playing;
    game
}

/// The smallest interesting board: one card per kind.
pub fn tiny_board() -> Vec<ImageCard> {
    vec![
        card("anchor", CardTeam::Blue, 0),
        card("balloon", CardTeam::Red, 1),
        card("bell", CardTeam::Neutral, 2),
        card("bicycle", CardTeam::Dead, 3),
    ]
}
