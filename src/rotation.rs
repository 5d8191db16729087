use serde::{Deserialize, Serialize};

use crate::rules::{MatchRules, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub server: Player,
    // 1 for the first serve of a turn, 2 for the second. Always 1 once service alternates every point.
    pub serve_number: u8,
    pub single_point: bool,
}

impl ServiceState {
    /// Serves left in the current turn, counting the upcoming one (2 -> 1 -> switch).
    pub fn serves_remaining(&self) -> u8 {
        if self.single_point {
            1
        } else {
            3 - self.serve_number
        }
    }
}

/// Server and serve number for the next rally of a set.
///
/// This is the single place service is derived; live play, undo and resume all call it with the
/// same inputs. Inside an unfinished set both counters sit at or above the deuce threshold exactly
/// when `total_points >= 2 * threshold`, so the point total alone decides whether deuce applies.
pub fn compute(
    total_points: u32,
    is_final_set: bool,
    set_starting_server: Player,
    rules: &MatchRules,
) -> ServiceState {
    let deuce_total = rules.deuce_threshold(is_final_set) * 2;
    let single_point = is_final_set || total_points >= deuce_total;

    if single_point {
        let server = if total_points % 2 == 0 {
            set_starting_server
        } else {
            set_starting_server.other()
        };
        return ServiceState {
            server,
            serve_number: 1,
            single_point,
        };
    }

    let server = if (total_points / 2) % 2 == 0 {
        set_starting_server
    } else {
        set_starting_server.other()
    };
    ServiceState {
        server,
        serve_number: (total_points % 2) as u8 + 1,
        single_point,
    }
}
