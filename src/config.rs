use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::rules::MatchRules;

pub const DEFAULT_PLAYER1_NAME: &str = "Player 1";
pub const DEFAULT_PLAYER2_NAME: &str = "Player 2";
pub const DEFAULT_TOPIC_PREFIX: &str = "scoreboard/";
const MIN_TELEMETRY_MS: u64 = 100;
const MAX_TELEMETRY_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rules: MatchRules,
    pub remote_listen: Option<String>,
    pub topic_prefix: String,
    pub telemetry_url: Option<String>,
    pub telemetry_interval: Duration,
    pub db_path: Option<PathBuf>,
    pub player1_name: String,
    pub player2_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: MatchRules::default(),
            remote_listen: None,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            telemetry_url: None,
            telemetry_interval: Duration::from_millis(500),
            db_path: None,
            player1_name: DEFAULT_PLAYER1_NAME.to_string(),
            player2_name: DEFAULT_PLAYER2_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call after `dotenvy` has loaded any `.env` files.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut rules = defaults.rules;
        rules.final_set_win_points = lookup("FINAL_SET_WIN_POINTS")
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(rules.final_set_win_points)
            .clamp(2, rules.regular_win_points);

        let telemetry_ms = lookup("TELEMETRY_POLL_MS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(500)
            .clamp(MIN_TELEMETRY_MS, MAX_TELEMETRY_MS);

        Self {
            rules,
            remote_listen: non_empty(lookup("REMOTE_LISTEN")),
            topic_prefix: non_empty(lookup("REMOTE_TOPIC_PREFIX"))
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.topic_prefix),
            telemetry_url: non_empty(lookup("TELEMETRY_URL")),
            telemetry_interval: Duration::from_millis(telemetry_ms),
            db_path: non_empty(lookup("SCOREBOARD_DB")).map(PathBuf::from),
            player1_name: non_empty(lookup("PLAYER1_NAME")).unwrap_or(defaults.player1_name),
            player2_name: non_empty(lookup("PLAYER2_NAME")).unwrap_or(defaults.player2_name),
        }
    }
}

pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

fn non_empty(val: Option<String>) -> Option<String> {
    val.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
