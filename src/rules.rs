use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

/// Display-relative half of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Player standing on this side for the given swap state.
    pub fn player(self, swapped: bool) -> Player {
        match (self, swapped) {
            (Side::Left, false) | (Side::Right, true) => Player::One,
            (Side::Right, false) | (Side::Left, true) => Player::Two,
        }
    }

    pub fn of_player(player: Player, swapped: bool) -> Side {
        match (player, swapped) {
            (Player::One, false) | (Player::Two, true) => Side::Left,
            (Player::Two, false) | (Player::One, true) => Side::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    pub regular_win_points: u32,
    // House rule: the deciding set is played to 6 rather than 11.
    pub final_set_win_points: u32,
    pub win_margin: u32,
    pub sets_to_win: usize,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            regular_win_points: 11,
            final_set_win_points: 6,
            win_margin: 2,
            sets_to_win: 3,
        }
    }
}

impl MatchRules {
    pub fn max_sets(&self) -> usize {
        self.sets_to_win * 2 - 1
    }

    /// The deciding set is the one played once `max_sets - 1` sets are done.
    pub fn is_final_set(&self, completed_sets: usize) -> bool {
        completed_sets + 1 == self.max_sets()
    }

    pub fn win_points(&self, is_final_set: bool) -> u32 {
        if is_final_set {
            self.final_set_win_points
        } else {
            self.regular_win_points
        }
    }

    pub fn deuce_threshold(&self, is_final_set: bool) -> u32 {
        self.win_points(is_final_set).saturating_sub(1)
    }

    /// Leader of a finished set, if `(a, b)` satisfies the win threshold and margin.
    pub fn set_winner(&self, a: u32, b: u32, is_final_set: bool) -> Option<std::cmp::Ordering> {
        let win = self.win_points(is_final_set);
        if a >= win && a >= b + self.win_margin {
            Some(std::cmp::Ordering::Greater)
        } else if b >= win && b >= a + self.win_margin {
            Some(std::cmp::Ordering::Less)
        } else {
            None
        }
    }
}
