use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PLAYER1_NAME, DEFAULT_PLAYER2_NAME};
use crate::reconstruct::MatchRecord;

const CACHE_DIR: &str = "tt_scoreboard";
const MATCH_FILE: &str = "current_match.json";
const SETTINGS_FILE: &str = "settings.json";
// Version 1 logged rallies by display side; those files are not resumed.
const MATCH_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MatchFile {
    version: u32,
    record: MatchRecord,
}

/// Key/value settings that survive restarts. Display names are never read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_player1")]
    pub player1_name: String,
    #[serde(default = "default_player2")]
    pub player2_name: String,
    #[serde(default = "default_true")]
    pub change_sides: bool,
    #[serde(default)]
    pub change_sides_anim: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player1_name: default_player1(),
            player2_name: default_player2(),
            change_sides: true,
            change_sides_anim: false,
        }
    }
}

fn default_player1() -> String {
    DEFAULT_PLAYER1_NAME.to_string()
}

fn default_player2() -> String {
    DEFAULT_PLAYER2_NAME.to_string()
}

fn default_true() -> bool {
    true
}

pub fn app_cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn match_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(MATCH_FILE))
}

pub fn settings_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(SETTINGS_FILE))
}

/// Reads a saved match. Missing, unreadable or other-version files yield `None`.
pub fn load_match_from(path: &Path) -> Option<MatchRecord> {
    let raw = fs::read_to_string(path).ok()?;
    let file = serde_json::from_str::<MatchFile>(&raw).ok()?;
    if file.version != MATCH_VERSION {
        return None;
    }
    Some(file.record)
}

pub fn save_match_to(path: &Path, record: &MatchRecord) -> Result<()> {
    let file = MatchFile {
        version: MATCH_VERSION,
        record: record.clone(),
    };
    let json = serde_json::to_string(&file).context("serialize match record")?;
    write_atomic(path, &json)
}

pub fn clear_match_at(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

pub fn load_settings_from(path: &Path) -> Option<Settings> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Settings>(&raw).ok()
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).context("serialize settings")?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Player;

    #[test]
    fn match_record_survives_a_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(MATCH_FILE);
        let record = MatchRecord {
            session: "abc".to_string(),
            starting_server: Some(Player::Two),
            current_set: vec![Player::Two, Player::One],
            completed_sets: Vec::new(),
        };
        save_match_to(&path, &record).unwrap();
        assert_eq!(load_match_from(&path), Some(record));

        clear_match_at(&path).unwrap();
        assert_eq!(load_match_from(&path), None);
        clear_match_at(&path).unwrap();
    }

    #[test]
    fn side_keyed_version_one_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MATCH_FILE);
        fs::write(
            &path,
            r#"{"version":1,"record":{"session":"x","starting_server":"One","current_set":["left"]}}"#,
        )
        .unwrap();
        assert_eq!(load_match_from(&path), None);
    }

    #[test]
    fn other_versions_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MATCH_FILE);
        fs::write(
            &path,
            r#"{"version":99,"record":{"session":"x","starting_server":null}}"#,
        )
        .unwrap();
        assert_eq!(load_match_from(&path), None);
    }

    #[test]
    fn persisted_layout_has_no_derived_fields() {
        let record = MatchRecord {
            session: "abc".to_string(),
            starting_server: Some(Player::One),
            current_set: vec![Player::One],
            completed_sets: Vec::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"server\""));
        assert!(!json.contains("serve_number"));
        assert!(!json.contains("swapped"));
    }

    #[test]
    fn settings_fill_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"player1_name":"Ana"}"#).unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.player1_name, "Ana");
        assert_eq!(settings.player2_name, DEFAULT_PLAYER2_NAME);
        assert!(settings.change_sides);

        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), Some(settings));
    }
}
