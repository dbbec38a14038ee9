//! Rule enforcement for the card game.
//!
//! Every operation validates against the current state and returns an error
//! without mutating anything on rejection, so a failed call never leaves a
//! half-applied turn behind.

use tracing::info;

use crate::error::GameError;
use crate::game::deck::{self, DeckComposition};
use crate::game::model::{CardTeam, Game, GameStatus, Player, Team, TeamId};
use crate::session::PeerId;

/// Blue starts and owns one more card, so it gets one fewer guess budget.
const BLUE_TRIES: u32 = 5;
const RED_TRIES: u32 = 6;

impl Game {
    /// Deal a fresh board and move to `Playing`.
    ///
    /// Players survive a restart; cards, try budgets, turn and winner are
    /// reset.
    pub fn start(&mut self) -> Result<(), GameError> {
        let cards = deck::generate(&DeckComposition::default())?;
        self.images = cards
            .into_iter()
            .map(|card| (card.image_id.clone(), card))
            .collect();
        self.teams = [
            (
                TeamId::Blue,
                Team {
                    team_id: TeamId::Blue,
                    nb_try_left: BLUE_TRIES,
                },
            ),
            (
                TeamId::Red,
                Team {
                    team_id: TeamId::Red,
                    nb_try_left: RED_TRIES,
                },
            ),
        ]
        .into();
        self.team_playing = TeamId::Blue;
        self.winner = TeamId::Unassigned;
        self.game_status = GameStatus::Playing;
        info!("new round dealt, blue to play");
        Ok(())
    }

    /// Back to the lobby without touching the player roster.
    pub fn set_in_waiting(&mut self) {
        self.images.clear();
        self.teams.clear();
        self.team_playing = TeamId::Unassigned;
        self.winner = TeamId::Unassigned;
        self.game_status = GameStatus::Waiting;
    }

    /// Insert or replace a player record.
    pub fn update_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: &PeerId) {
        self.players.remove(id);
    }

    /// Toggle the hint marker on a card.
    pub fn hint_card(&mut self, image_id: &str) -> Result<(), GameError> {
        let card = self
            .images
            .get_mut(image_id)
            .ok_or_else(|| GameError::UnknownImage(image_id.to_string()))?;
        card.is_hint = !card.is_hint;
        Ok(())
    }

    /// The playing team passes without flipping a card.
    pub fn ok_next_team(&mut self) -> Result<(), GameError> {
        if self.game_status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        self.clear_hints();
        self.team_playing = self.team_playing.other();
        Ok(())
    }

    /// Flip a card on behalf of `player` and resolve the consequences.
    pub fn chose_card(&mut self, image_id: &str, player: &Player) -> Result<(), GameError> {
        if self.game_status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        let team = player.team_id;
        if !self.teams.contains_key(&team) {
            return Err(GameError::UnknownTeam(team));
        }
        let card = self
            .images
            .get_mut(image_id)
            .ok_or_else(|| GameError::UnknownImage(image_id.to_string()))?;

        card.flipped_by_team = team;
        card.is_hint = false;
        let card_team = card.image_team;

        if card_team == CardTeam::Dead {
            info!(%player, "dead card flipped");
            self.end(team.other());
            return Ok(());
        }

        let tries = self
            .teams
            .get_mut(&team)
            .ok_or(GameError::UnknownTeam(team))?;
        tries.nb_try_left = tries.nb_try_left.saturating_sub(1);
        let tries_left = tries.nb_try_left;

        // A wrong guess passes the turn before any win is resolved.
        if !card_team.belongs_to(team) {
            self.clear_hints();
            self.team_playing = team.other();
        }

        // Win precedence: dead card above, then the flipping team clearing
        // its own cards, then handing the opponent its last card, then
        // running out of tries.
        if self.remaining_for(team) == 0 {
            self.end(team);
        } else if self.remaining_for(team.other()) == 0 {
            self.end(team.other());
        } else if tries_left == 0 {
            self.end(team.other());
        }
        Ok(())
    }

    /// Face-down cards still owned by `team`.
    pub fn remaining_for(&self, team: TeamId) -> usize {
        self.images
            .values()
            .filter(|card| card.is_unflipped() && card.image_team.belongs_to(team))
            .count()
    }

    fn end(&mut self, winner: TeamId) {
        self.game_status = GameStatus::Finished;
        self.clear_hints();
        self.winner = winner;
        info!(%winner, "game over");
    }

    fn clear_hints(&mut self) {
        for card in self.images.values_mut() {
            card.is_hint = false;
        }
    }
}
