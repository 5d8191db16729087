use serde::{Deserialize, Serialize};

use crate::engine::{MatchState, Phase, SideConfig};
use crate::reconstruct::MatchRecord;
use crate::rules::{MatchRules, Player, Side};

/// What the engine hands out after every accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub record: MatchRecord,
    pub view: ScoreboardView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySetScore {
    pub left: u32,
    pub right: u32,
}

/// Read-only projection for rendering and telemetry, in display-side terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardView {
    pub phase: Phase,
    pub set_number: usize,
    pub left_player: Player,
    pub right_player: Player,
    pub left_points: u32,
    pub right_points: u32,
    pub left_sets: usize,
    pub right_sets: usize,
    // One slot per possible set; finished sets are re-oriented to the current swap state.
    pub set_scores: Vec<Option<DisplaySetScore>>,
    pub server_side: Option<Side>,
    pub serve_number: u8,
    pub serves_remaining: u8,
    pub single_point_service: bool,
    pub is_final_set: bool,
    pub is_deuce: bool,
    pub winner: Option<Player>,
    pub match_active: bool,
    pub side_swapped: bool,
    pub change_sides: bool,
    pub change_sides_anim: bool,
}

impl ScoreboardView {
    pub fn project(state: &MatchState, rules: &MatchRules, sides: SideConfig) -> Self {
        let derived = state.derived();
        let swapped = derived.is_side_swapped;
        let left_player = Side::Left.player(swapped);
        let right_player = Side::Right.player(swapped);
        let history = state.history();

        let mut set_scores: Vec<Option<DisplaySetScore>> = history
            .results()
            .map(|r| {
                Some(DisplaySetScore {
                    left: r.points_for(left_player),
                    right: r.points_for(right_player),
                })
            })
            .collect();
        set_scores.resize(rules.max_sets().max(set_scores.len()), None);

        let service = derived.service;
        let phase = state.phase();
        Self {
            phase,
            set_number: (history.len() + 1).min(rules.max_sets()),
            left_player,
            right_player,
            left_points: state.scoreboard().count(left_player),
            right_points: state.scoreboard().count(right_player),
            left_sets: history.sets_won(left_player),
            right_sets: history.sets_won(right_player),
            set_scores,
            server_side: service.map(|s| Side::of_player(s.server, swapped)),
            serve_number: service.map(|s| s.serve_number).unwrap_or(0),
            serves_remaining: service.map(|s| s.serves_remaining()).unwrap_or(0),
            single_point_service: service.is_some_and(|s| s.single_point),
            is_final_set: derived.is_final_set,
            is_deuce: derived.is_deuce,
            winner: derived.winner,
            match_active: phase == Phase::InProgress,
            side_swapped: swapped,
            change_sides: sides.change_sides,
            change_sides_anim: sides.animate,
        }
    }

    pub fn sets_won(&self, player: Player) -> usize {
        if self.left_player == player {
            self.left_sets
        } else {
            self.right_sets
        }
    }
}
