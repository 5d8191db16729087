use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::history::{CompletedSet, MatchHistory, SetResult};
use crate::reconstruct::{self, MatchRecord};
use crate::rotation::ServiceState;
use crate::rules::{MatchRules, Player, Side};
use crate::scoreboard::SetScoreboard;
use crate::snapshot::{MatchSnapshot, ScoreboardView};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("current set has no points to remove")]
    EmptyHistory,
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("malformed persisted state: {0}")]
    MalformedPersistedState(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChooseFirstServer(Player),
    AddPoint(Side),
    RemovePoint,
    SetChangeSides(bool),
    SetChangeSidesAnim(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingFirstServer,
    InProgress,
    MatchComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideConfig {
    pub change_sides: bool,
    pub animate: bool,
}

impl Default for SideConfig {
    fn default() -> Self {
        Self {
            change_sides: true,
            animate: false,
        }
    }
}

/// Opaque token identifying a match session for persistence and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fields recomputed from the primitive log after every transition. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Derived {
    pub winner: Option<Player>,
    pub set_starting_server: Option<Player>,
    pub service: Option<ServiceState>,
    pub is_final_set: bool,
    pub is_deuce: bool,
    pub is_side_swapped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchState {
    pub(crate) starting_server: Option<Player>,
    pub(crate) scoreboard: SetScoreboard,
    pub(crate) history: MatchHistory,
    pub(crate) derived: Derived,
}

impl MatchState {
    pub fn starting_server(&self) -> Option<Player> {
        self.starting_server
    }

    pub fn scoreboard(&self) -> &SetScoreboard {
        &self.scoreboard
    }

    pub fn history(&self) -> &MatchHistory {
        &self.history
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    pub fn winner(&self) -> Option<Player> {
        self.derived.winner
    }

    pub fn phase(&self) -> Phase {
        if self.starting_server.is_none() {
            Phase::AwaitingFirstServer
        } else if self.derived.winner.is_some() {
            Phase::MatchComplete
        } else {
            Phase::InProgress
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    session: SessionId,
    rules: MatchRules,
    sides: SideConfig,
    state: MatchState,
}

impl MatchEngine {
    pub fn new(session: SessionId, rules: MatchRules, sides: SideConfig) -> Self {
        let mut state = MatchState::default();
        reconstruct::refresh(&mut state, &rules, sides);
        Self {
            session,
            rules,
            sides,
            state,
        }
    }

    /// Rebuilds an engine from a persisted record. Only the primitive log is trusted.
    pub fn resume(
        record: &MatchRecord,
        rules: MatchRules,
        sides: SideConfig,
    ) -> Result<Self, EngineError> {
        let state = reconstruct::rehydrate_record(record, &rules, sides)?;
        Ok(Self {
            session: SessionId::new(record.session.clone()),
            rules,
            sides,
            state,
        })
    }

    /// Applies one command. On error nothing has been mutated.
    pub fn apply(&mut self, command: Command) -> Result<MatchSnapshot, EngineError> {
        match command {
            Command::ChooseFirstServer(player) => {
                if self.state.phase() != Phase::AwaitingFirstServer {
                    return Err(EngineError::InvalidState("first server already chosen"));
                }
                self.state.starting_server = Some(player);
            }
            Command::AddPoint(side) => self.add_point(side)?,
            Command::RemovePoint => self.remove_point()?,
            Command::SetChangeSides(enabled) => self.sides.change_sides = enabled,
            Command::SetChangeSidesAnim(enabled) => self.sides.animate = enabled,
        }
        reconstruct::refresh(&mut self.state, &self.rules, self.sides);
        Ok(self.snapshot())
    }

    fn ensure_in_progress(&self) -> Result<(), EngineError> {
        match self.state.phase() {
            Phase::AwaitingFirstServer => Err(EngineError::InvalidState("no first server chosen")),
            Phase::MatchComplete => Err(EngineError::InvalidState("match already has a winner")),
            Phase::InProgress => Ok(()),
        }
    }

    /// Display sides are resolved to a player here; everything past this point is player-keyed.
    fn add_point(&mut self, side: Side) -> Result<(), EngineError> {
        self.ensure_in_progress()?;
        let is_final_set = self.state.derived.is_final_set;
        let player = side.player(self.state.derived.is_side_swapped);

        let board = &mut self.state.scoreboard;
        board.add_point(player);
        if self.state.history.len() < self.rules.max_sets()
            && board.check_set_complete(&self.rules, is_final_set)
        {
            let result = SetResult {
                player1: board.count(Player::One),
                player2: board.count(Player::Two),
            };
            let points = board.take_points();
            self.state.history.push(CompletedSet { result, points });
        }
        Ok(())
    }

    fn remove_point(&mut self) -> Result<(), EngineError> {
        self.ensure_in_progress()?;
        if !self.state.scoreboard.is_empty() {
            self.state.scoreboard.remove_last_point()?;
            return Ok(());
        }

        let reopenable = self
            .state
            .history
            .sets()
            .last()
            .is_some_and(|set| !set.points.is_empty());
        if !reopenable {
            return Err(EngineError::NothingToUndo);
        }
        let Some(reopened) = self.state.history.pop() else {
            return Err(EngineError::NothingToUndo);
        };
        let mut board = SetScoreboard::from_points(reopened.points);
        board.remove_last_point()?;
        self.state.scoreboard = board;
        Ok(())
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            record: self.record(),
            view: self.view(),
        }
    }

    pub fn record(&self) -> MatchRecord {
        MatchRecord::capture(&self.session, &self.state)
    }

    pub fn view(&self) -> ScoreboardView {
        ScoreboardView::project(&self.state, &self.rules, self.sides)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    pub fn sides(&self) -> SideConfig {
        self.sides
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }
}
