//! Rebuilds derived match fields from the primitive log.
//!
//! Used after every engine transition and when resuming from a persisted record. Persisted
//! records carry only point logs, set results and the first server; server, serve number and
//! side swap are always recomputed here.

use serde::{Deserialize, Serialize};

use crate::engine::{Derived, EngineError, MatchState, SessionId, SideConfig};
use crate::history::{CompletedSet, MatchHistory, SetResult};
use crate::rotation;
use crate::rules::{MatchRules, Player};
use crate::scoreboard::SetScoreboard;

/// Durable layout of a match. Deliberately has no service or swap fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub session: String,
    pub starting_server: Option<Player>,
    #[serde(default)]
    pub current_set: Vec<Player>,
    #[serde(default)]
    pub completed_sets: Vec<PersistedSet>,
}

// Scores are signed so that corrupt files decode and can be rejected explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSet {
    pub player1: i64,
    pub player2: i64,
    #[serde(default)]
    pub points: Vec<Player>,
}

impl MatchRecord {
    pub fn capture(session: &SessionId, state: &MatchState) -> Self {
        Self {
            session: session.as_str().to_string(),
            starting_server: state.starting_server(),
            current_set: state.scoreboard().points().to_vec(),
            completed_sets: state
                .history()
                .sets()
                .iter()
                .map(|set| PersistedSet {
                    player1: i64::from(set.result.player1),
                    player2: i64::from(set.result.player2),
                    points: set.points.clone(),
                })
                .collect(),
        }
    }

    pub fn is_finished(&self, rules: &MatchRules) -> bool {
        let mut wins = [0usize; 2];
        for set in &self.completed_sets {
            if set.player1 > set.player2 {
                wins[0] += 1;
            } else if set.player2 > set.player1 {
                wins[1] += 1;
            }
        }
        wins.iter().any(|w| *w >= rules.sets_to_win)
    }
}

/// Validates a persisted record and rebuilds the full state from it.
pub fn rehydrate_record(
    record: &MatchRecord,
    rules: &MatchRules,
    sides: SideConfig,
) -> Result<MatchState, EngineError> {
    let mut completed = Vec::with_capacity(record.completed_sets.len());
    for (idx, set) in record.completed_sets.iter().enumerate() {
        let (Ok(player1), Ok(player2)) = (u32::try_from(set.player1), u32::try_from(set.player2))
        else {
            return Err(malformed(format!(
                "set {} has a negative or oversized score {}-{}",
                idx + 1,
                set.player1,
                set.player2
            )));
        };
        completed.push(CompletedSet {
            result: SetResult { player1, player2 },
            points: set.points.clone(),
        });
    }
    rehydrate(
        record.starting_server,
        completed,
        record.current_set.clone(),
        rules,
        sides,
    )
}

/// Builds a [`MatchState`] from primitives, refusing anything the engine could not have produced.
pub fn rehydrate(
    starting_server: Option<Player>,
    completed_sets: Vec<CompletedSet>,
    current_set: Vec<Player>,
    rules: &MatchRules,
    sides: SideConfig,
) -> Result<MatchState, EngineError> {
    if completed_sets.len() > rules.max_sets() {
        return Err(malformed(format!(
            "{} completed sets exceeds the maximum of {}",
            completed_sets.len(),
            rules.max_sets()
        )));
    }
    if starting_server.is_none() && (!completed_sets.is_empty() || !current_set.is_empty()) {
        return Err(malformed("points recorded without a first server".to_string()));
    }

    let mut history = MatchHistory::new();
    for (idx, set) in completed_sets.into_iter().enumerate() {
        if history.match_winner(rules.sets_to_win).is_some() {
            return Err(malformed(format!("set {} played after the match was won", idx + 1)));
        }
        validate_completed_set(idx, &set, rules)?;
        history.push(set);
    }

    let scoreboard = SetScoreboard::from_points(current_set);
    if !scoreboard.is_empty() && history.match_winner(rules.sets_to_win).is_some() {
        return Err(malformed("points recorded after the match was won".to_string()));
    }
    if !scoreboard.is_empty() && history.len() >= rules.max_sets() {
        return Err(malformed("points recorded after the final set".to_string()));
    }
    if scoreboard.check_set_complete(rules, rules.is_final_set(history.len())) {
        return Err(malformed("current set is already decided".to_string()));
    }

    let mut state = MatchState {
        starting_server,
        scoreboard,
        history,
        derived: Derived::default(),
    };
    refresh(&mut state, rules, sides);
    Ok(state)
}

fn validate_completed_set(
    idx: usize,
    set: &CompletedSet,
    rules: &MatchRules,
) -> Result<(), EngineError> {
    let SetResult { player1, player2 } = set.result;
    let is_final_set = rules.is_final_set(idx);
    if rules.set_winner(player1, player2, is_final_set).is_none() {
        return Err(malformed(format!(
            "set {} score {player1}-{player2} is not a finished set",
            idx + 1
        )));
    }
    // The log must end on the deciding rally and match the frozen result exactly.
    let mut replay = SetScoreboard::new();
    for (n, player) in set.points.iter().enumerate() {
        if replay.check_set_complete(rules, is_final_set) {
            return Err(malformed(format!(
                "set {} point log continues after the set was decided at rally {n}",
                idx + 1
            )));
        }
        replay.add_point(*player);
    }
    let (p1, p2) = (replay.count(Player::One), replay.count(Player::Two));
    if (p1, p2) != (player1, player2) {
        return Err(malformed(format!(
            "set {} point log {p1}-{p2} does not match result {player1}-{player2}",
            idx + 1
        )));
    }
    Ok(())
}

fn malformed(reason: String) -> EngineError {
    EngineError::MalformedPersistedState(reason)
}

/// Recomputes every derived field of `state` from its primitives.
pub fn refresh(state: &mut MatchState, rules: &MatchRules, sides: SideConfig) {
    state.derived = derive(
        state.starting_server,
        &state.scoreboard,
        &state.history,
        rules,
        sides,
    );
}

pub fn derive(
    starting_server: Option<Player>,
    scoreboard: &SetScoreboard,
    history: &MatchHistory,
    rules: &MatchRules,
    sides: SideConfig,
) -> Derived {
    let completed = history.len();
    let is_final_set = rules.is_final_set(completed);
    let winner = history.match_winner(rules.sets_to_win);
    let set_starting_server = starting_server.map(|first| {
        if completed % 2 == 0 {
            first
        } else {
            first.other()
        }
    });
    let service = match (set_starting_server, winner) {
        (Some(server), None) => Some(rotation::compute(
            scoreboard.total(),
            is_final_set,
            server,
            rules,
        )),
        _ => None,
    };

    Derived {
        winner,
        set_starting_server,
        service,
        is_final_set,
        is_deuce: scoreboard.is_deuce(rules, is_final_set),
        is_side_swapped: sides.change_sides && completed % 2 == 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sets: Vec<PersistedSet>, current: Vec<Player>) -> MatchRecord {
        MatchRecord {
            session: "s".to_string(),
            starting_server: Some(Player::One),
            current_set: current,
            completed_sets: sets,
        }
    }

    // Alternating rallies, closed out by the set winner.
    fn clean_set(p1: u32, p2: u32) -> PersistedSet {
        let (winner, loser) = if p1 > p2 {
            (Player::One, Player::Two)
        } else {
            (Player::Two, Player::One)
        };
        let (won, lost) = (p1.max(p2), p1.min(p2));
        let mut points = Vec::new();
        for _ in 0..lost {
            points.push(loser);
            if points.iter().filter(|p| **p == winner).count() < won as usize - 1 {
                points.push(winner);
            }
        }
        while points.len() < (won + lost) as usize {
            points.push(winner);
        }
        PersistedSet {
            player1: i64::from(p1),
            player2: i64::from(p2),
            points,
        }
    }

    #[test]
    fn negative_scores_are_rejected() {
        let mut bad = clean_set(11, 3);
        bad.player2 = -3;
        let err = rehydrate_record(
            &record(vec![bad], Vec::new()),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPersistedState(_)));
    }

    #[test]
    fn too_many_sets_are_rejected() {
        let sets = (0..6).map(|_| clean_set(11, 9)).collect();
        let err = rehydrate_record(
            &record(sets, Vec::new()),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPersistedState(_)));
    }

    #[test]
    fn unfinished_set_result_is_rejected() {
        let err = rehydrate_record(
            &record(vec![clean_set(10, 9)], Vec::new()),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPersistedState(_)));
    }

    #[test]
    fn derived_fields_come_from_primitives() {
        let state = rehydrate_record(
            &record(vec![clean_set(11, 9)], vec![Player::One, Player::One, Player::Two]),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap();
        let d = state.derived();
        assert_eq!(d.set_starting_server, Some(Player::Two));
        assert!(d.is_side_swapped);
        let service = d.service.unwrap();
        // Three points played, second pair in progress: the non-starter serves their second ball.
        assert_eq!(service.server, Player::One);
        assert_eq!(service.serve_number, 2);
    }

    #[test]
    fn log_won_by_the_other_player_is_rejected() {
        let mut set = clean_set(11, 9);
        for p in set.points.iter_mut() {
            *p = p.other();
        }
        let err = rehydrate_record(
            &record(vec![set], Vec::new()),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPersistedState(_)));
    }

    #[test]
    fn log_that_runs_past_the_deciding_rally_is_rejected() {
        // 11-0 is already decided before player 2's two points arrive.
        let mut points = vec![Player::One; 11];
        points.extend([Player::Two, Player::Two]);
        let set = PersistedSet {
            player1: 11,
            player2: 2,
            points,
        };
        let err = rehydrate_record(
            &record(vec![set], Vec::new()),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPersistedState(_)));
    }

    #[test]
    fn clean_sets_rehydrate() {
        let sets = vec![clean_set(11, 9), clean_set(12, 14), clean_set(11, 0)];
        let state = rehydrate_record(
            &record(sets, vec![Player::Two]),
            &MatchRules::default(),
            SideConfig::default(),
        )
        .unwrap();
        assert_eq!(state.history().sets_won(Player::One), 2);
        assert_eq!(state.scoreboard().count(Player::Two), 1);
    }
}
