use std::cmp::Ordering;

use crate::engine::EngineError;
use crate::rules::{MatchRules, Player};

/// Point counters and rally log for the set in progress, keyed by the player who won each rally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetScoreboard {
    points: Vec<Player>,
    player1: u32,
    player2: u32,
}

impl SetScoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Player>) -> Self {
        let player1 = points.iter().filter(|p| **p == Player::One).count() as u32;
        let player2 = points.len() as u32 - player1;
        Self {
            points,
            player1,
            player2,
        }
    }

    pub fn add_point(&mut self, player: Player) {
        *self.counter(player) += 1;
        self.points.push(player);
    }

    pub fn remove_last_point(&mut self) -> Result<Player, EngineError> {
        let player = self.points.pop().ok_or(EngineError::EmptyHistory)?;
        *self.counter(player) -= 1;
        Ok(player)
    }

    /// Player who has taken the set, if any. Counters are left untouched.
    pub fn completed_by(&self, rules: &MatchRules, is_final_set: bool) -> Option<Player> {
        match rules.set_winner(self.player1, self.player2, is_final_set)? {
            Ordering::Greater => Some(Player::One),
            _ => Some(Player::Two),
        }
    }

    pub fn check_set_complete(&self, rules: &MatchRules, is_final_set: bool) -> bool {
        self.completed_by(rules, is_final_set).is_some()
    }

    pub fn is_deuce(&self, rules: &MatchRules, is_final_set: bool) -> bool {
        let threshold = rules.deuce_threshold(is_final_set);
        self.player1 >= threshold && self.player2 >= threshold
    }

    pub fn take_points(&mut self) -> Vec<Player> {
        self.player1 = 0;
        self.player2 = 0;
        std::mem::take(&mut self.points)
    }

    pub fn points(&self) -> &[Player] {
        &self.points
    }

    pub fn count(&self, player: Player) -> u32 {
        match player {
            Player::One => self.player1,
            Player::Two => self.player2,
        }
    }

    pub fn total(&self) -> u32 {
        self.player1 + self.player2
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn counter(&mut self, player: Player) -> &mut u32 {
        match player {
            Player::One => &mut self.player1,
            Player::Two => &mut self.player2,
        }
    }
}
