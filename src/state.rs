use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::engine::{Command, EngineError, MatchEngine, Phase, SessionId, SideConfig};
use crate::persist::Settings;
use crate::reconstruct::MatchRecord;
use crate::remote::RemoteCommand;
use crate::rules::{MatchRules, Player, Side};
use crate::snapshot::{MatchSnapshot, ScoreboardView};

const SWAP_BANNER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Match,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    TableTennis,
    Settings,
}

impl MenuItem {
    pub const ALL: [MenuItem; 2] = [MenuItem::TableTennis, MenuItem::Settings];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ChangeSides,
    ChangeSidesAnim,
    Player1Name,
    Player2Name,
}

impl SettingsField {
    pub const ALL: [SettingsField; 4] = [
        SettingsField::ChangeSides,
        SettingsField::ChangeSidesAnim,
        SettingsField::Player1Name,
        SettingsField::Player2Name,
    ];
}

/// Side effects requested by a state change; the main loop performs the I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist(MatchSnapshot),
    ClearSavedMatch,
    SaveSettings(Settings),
}

#[derive(Debug, Clone)]
pub enum Delta {
    Remote(RemoteCommand),
    Log(String),
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub menu_selected: usize,
    pub settings: Settings,
    pub settings_selected: usize,
    pub editing_name: bool,
    pub engine: MatchEngine,
    pub rules: MatchRules,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub swap_banner_until: Option<Instant>,
    effects: Vec<Effect>,
}

impl AppState {
    pub fn new(config: &AppConfig, settings: Settings) -> Self {
        let rules = config.rules;
        let engine = MatchEngine::new(SessionId::generate(), rules, side_config(&settings));
        Self {
            screen: Screen::Menu,
            menu_selected: 0,
            settings,
            settings_selected: 0,
            editing_name: false,
            engine,
            rules,
            logs: VecDeque::new(),
            help_overlay: false,
            swap_banner_until: None,
            effects: Vec::new(),
        }
    }

    /// Picks up an interrupted match. Finished or malformed records start a fresh match instead.
    pub fn resume(&mut self, record: &MatchRecord) {
        if record.is_finished(&self.rules) {
            self.push_log("[INFO] Saved match already finished; starting fresh");
            self.effects.push(Effect::ClearSavedMatch);
            return;
        }
        match MatchEngine::resume(record, self.rules, side_config(&self.settings)) {
            Ok(engine) => {
                self.engine = engine;
                if self.engine.phase() == Phase::InProgress {
                    self.screen = Screen::Match;
                }
                self.push_log(format!(
                    "[INFO] Resumed match {} at set {}",
                    record.session,
                    self.engine.view().set_number
                ));
            }
            Err(err) => {
                self.push_log(format!("[WARN] Saved match rejected: {err}"));
                self.effects.push(Effect::ClearSavedMatch);
            }
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn view(&self) -> ScoreboardView {
        self.engine.view()
    }

    pub fn player_name(&self, player: Player) -> &str {
        match player {
            Player::One => &self.settings.player1_name,
            Player::Two => &self.settings.player2_name,
        }
    }

    /// Runs a command through the engine. Rejections are logged, never fatal.
    pub fn apply_command(&mut self, command: Command) -> Option<MatchSnapshot> {
        let was_swapped = self.engine.state().derived().is_side_swapped;
        let was_complete = self.engine.phase() == Phase::MatchComplete;
        match self.engine.apply(command) {
            Ok(snapshot) => {
                if snapshot.view.side_swapped != was_swapped && snapshot.view.change_sides_anim {
                    self.swap_banner_until = Some(Instant::now() + SWAP_BANNER);
                }
                if let Some(winner) = snapshot.view.winner
                    && !was_complete
                {
                    let name = self.player_name(winner).to_string();
                    self.push_log(format!("[INFO] {name} wins the match"));
                }
                self.effects.push(Effect::Persist(snapshot.clone()));
                Some(snapshot)
            }
            Err(EngineError::NothingToUndo) => None,
            Err(err) => {
                self.push_log(format!("[WARN] {err}"));
                None
            }
        }
    }

    pub fn add_point(&mut self, side: Side) -> Option<MatchSnapshot> {
        self.apply_command(Command::AddPoint(side))
    }

    pub fn remove_point(&mut self) -> Option<MatchSnapshot> {
        self.apply_command(Command::RemovePoint)
    }

    pub fn choose_first_server(&mut self, player: Player) -> Option<MatchSnapshot> {
        self.apply_command(Command::ChooseFirstServer(player))
    }

    /// Abandons or archives the current match and starts an empty one.
    pub fn reset_match(&mut self) {
        self.engine = MatchEngine::new(
            SessionId::generate(),
            self.rules,
            side_config(&self.settings),
        );
        self.swap_banner_until = None;
        self.effects.push(Effect::ClearSavedMatch);
    }

    pub fn set_change_sides(&mut self, enabled: bool) {
        self.settings.change_sides = enabled;
        self.apply_command(Command::SetChangeSides(enabled));
        self.effects.push(Effect::SaveSettings(self.settings.clone()));
    }

    pub fn set_change_sides_anim(&mut self, enabled: bool) {
        self.settings.change_sides_anim = enabled;
        self.apply_command(Command::SetChangeSidesAnim(enabled));
        self.effects.push(Effect::SaveSettings(self.settings.clone()));
    }

    pub fn set_player_name(&mut self, player: Player, name: String) {
        match player {
            Player::One => self.settings.player1_name = name,
            Player::Two => self.settings.player2_name = name,
        }
        self.effects.push(Effect::SaveSettings(self.settings.clone()));
    }

    pub fn selected_menu_item(&self) -> MenuItem {
        MenuItem::ALL[self.menu_selected.min(MenuItem::ALL.len() - 1)]
    }

    pub fn selected_settings_field(&self) -> SettingsField {
        SettingsField::ALL[self.settings_selected.min(SettingsField::ALL.len() - 1)]
    }

    pub fn select_next(&mut self) {
        match self.screen {
            Screen::Menu => {
                self.menu_selected = (self.menu_selected + 1).min(MenuItem::ALL.len() - 1);
            }
            Screen::Settings if !self.editing_name => {
                self.settings_selected =
                    (self.settings_selected + 1).min(SettingsField::ALL.len() - 1);
            }
            _ => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.screen {
            Screen::Menu => self.menu_selected = self.menu_selected.saturating_sub(1),
            Screen::Settings if !self.editing_name => {
                self.settings_selected = self.settings_selected.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Enter on the settings screen: toggles flags, or starts/stops editing a name.
    pub fn activate_settings_field(&mut self) {
        match self.selected_settings_field() {
            SettingsField::ChangeSides => self.set_change_sides(!self.settings.change_sides),
            SettingsField::ChangeSidesAnim => {
                self.set_change_sides_anim(!self.settings.change_sides_anim)
            }
            SettingsField::Player1Name | SettingsField::Player2Name => {
                if self.editing_name {
                    self.editing_name = false;
                    self.effects.push(Effect::SaveSettings(self.settings.clone()));
                } else {
                    self.editing_name = true;
                }
            }
        }
    }

    pub fn edit_name(&mut self, ch: Option<char>) {
        if !self.editing_name {
            return;
        }
        let name = match self.selected_settings_field() {
            SettingsField::Player1Name => &mut self.settings.player1_name,
            SettingsField::Player2Name => &mut self.settings.player2_name,
            _ => return,
        };
        match ch {
            Some(c) if name.chars().count() < 24 => name.push(c),
            Some(_) => {}
            None => {
                name.pop();
            }
        }
    }

    pub fn swap_banner_active(&self, now: Instant) -> bool {
        self.swap_banner_until.is_some_and(|until| now < until)
    }
}

pub fn side_config(settings: &Settings) -> SideConfig {
    SideConfig {
        change_sides: settings.change_sides,
        animate: settings.change_sides_anim,
    }
}

/// Single consumer for everything arriving from background threads.
pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Remote(cmd) => match cmd {
            RemoteCommand::PointLeft => {
                state.add_point(Side::Left);
            }
            RemoteCommand::PointRight => {
                state.add_point(Side::Right);
            }
            RemoteCommand::RemovePoint => {
                state.remove_point();
            }
            RemoteCommand::SetP1Name(name) => state.set_player_name(Player::One, name),
            RemoteCommand::SetP2Name(name) => state.set_player_name(Player::Two, name),
            RemoteCommand::SetChangeSides(enabled) => state.set_change_sides(enabled),
            RemoteCommand::SetChangeSidesAnim(enabled) => state.set_change_sides_anim(enabled),
        },
        Delta::Log(msg) => state.push_log(msg),
    }
}
