use serde::{Deserialize, Serialize};

use crate::rules::Player;

/// Final score of a set in absolute player terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResult {
    pub player1: u32,
    pub player2: u32,
}

impl SetResult {
    pub fn winner(&self) -> Option<Player> {
        if self.player1 > self.player2 {
            Some(Player::One)
        } else if self.player2 > self.player1 {
            Some(Player::Two)
        } else {
            None
        }
    }

    pub fn points_for(&self, player: Player) -> u32 {
        match player {
            Player::One => self.player1,
            Player::Two => self.player2,
        }
    }
}

/// A finished set together with the rallies that produced it, kept so undo can reopen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSet {
    pub result: SetResult,
    pub points: Vec<Player>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchHistory {
    sets: Vec<CompletedSet>,
}

impl MatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sets(sets: Vec<CompletedSet>) -> Self {
        Self { sets }
    }

    pub fn push(&mut self, set: CompletedSet) {
        self.sets.push(set);
    }

    pub fn pop(&mut self) -> Option<CompletedSet> {
        self.sets.pop()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[CompletedSet] {
        &self.sets
    }

    pub fn results(&self) -> impl Iterator<Item = SetResult> + '_ {
        self.sets.iter().map(|s| s.result)
    }

    pub fn sets_won(&self, player: Player) -> usize {
        self.results().filter(|r| r.winner() == Some(player)).count()
    }

    pub fn match_winner(&self, sets_to_win: usize) -> Option<Player> {
        [Player::One, Player::Two]
            .into_iter()
            .find(|p| self.sets_won(*p) >= sets_to_win)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(p1: u32, p2: u32) -> CompletedSet {
        CompletedSet {
            result: SetResult {
                player1: p1,
                player2: p2,
            },
            points: Vec::new(),
        }
    }

    #[test]
    fn points_for_reads_absolute_scores() {
        let r = set(7, 11).result;
        assert_eq!(r.points_for(Player::One), 7);
        assert_eq!(r.points_for(Player::Two), 11);
        assert_eq!(r.winner(), Some(Player::Two));
    }

    #[test]
    fn winner_after_three_sets() {
        let mut h = MatchHistory::new();
        h.push(set(11, 5));
        h.push(set(8, 11));
        h.push(set(11, 9));
        assert_eq!(h.match_winner(3), None);
        h.push(set(13, 11));
        assert_eq!(h.sets_won(Player::One), 3);
        assert_eq!(h.sets_won(Player::Two), 1);
        assert_eq!(h.match_winner(3), Some(Player::One));
    }
}
