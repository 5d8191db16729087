use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::history::SetResult;
use crate::persist::app_cache_dir;
use crate::reconstruct::MatchRecord;
use crate::rules::{MatchRules, Player};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMatch {
    pub session: String,
    pub player1: String,
    pub player2: String,
    pub starting_server: Option<u8>,
    pub winner: Option<u8>,
    pub sets_p1: u32,
    pub sets_p2: u32,
    pub updated_at: String,
    pub sets: Vec<SetResult>,
}

impl StoredMatch {
    pub fn score_line(&self) -> String {
        self.sets
            .iter()
            .map(|s| format!("{}-{}", s.player1, s.player2))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("match_history.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            session TEXT PRIMARY KEY,
            player1 TEXT NOT NULL,
            player2 TEXT NOT NULL,
            starting_server INTEGER NULL,
            winner INTEGER NULL,
            sets_p1 INTEGER NOT NULL,
            sets_p2 INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_updated ON matches(updated_at);

        CREATE TABLE IF NOT EXISTS sets (
            session TEXT NOT NULL,
            set_index INTEGER NOT NULL,
            player1_points INTEGER NOT NULL,
            player2_points INTEGER NOT NULL,
            PRIMARY KEY (session, set_index)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Mirrors the finished sets of a match. Rewrites the set rows so an undone set disappears.
pub fn record_match(
    conn: &mut Connection,
    record: &MatchRecord,
    rules: &MatchRules,
    player1: &str,
    player2: &str,
) -> Result<()> {
    let results: Vec<(i64, i64)> = record
        .completed_sets
        .iter()
        .map(|s| (s.player1, s.player2))
        .collect();
    let sets_p1 = results.iter().filter(|(a, b)| a > b).count() as i64;
    let sets_p2 = results.iter().filter(|(a, b)| b > a).count() as i64;
    let winner = if sets_p1 >= rules.sets_to_win as i64 {
        Some(1)
    } else if sets_p2 >= rules.sets_to_win as i64 {
        Some(2)
    } else {
        None
    };

    let tx = conn.transaction().context("begin match transaction")?;
    tx.execute(
        r#"
        INSERT INTO matches (session, player1, player2, starting_server, winner, sets_p1, sets_p2, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(session) DO UPDATE SET
            player1 = excluded.player1,
            player2 = excluded.player2,
            starting_server = excluded.starting_server,
            winner = excluded.winner,
            sets_p1 = excluded.sets_p1,
            sets_p2 = excluded.sets_p2,
            updated_at = excluded.updated_at
        "#,
        params![
            record.session,
            player1,
            player2,
            record.starting_server.map(Player::number),
            winner,
            sets_p1,
            sets_p2,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match row")?;
    tx.execute("DELETE FROM sets WHERE session = ?1", params![record.session])
        .context("clear set rows")?;
    for (idx, (p1, p2)) in results.iter().enumerate() {
        tx.execute(
            "INSERT INTO sets (session, set_index, player1_points, player2_points) VALUES (?1, ?2, ?3, ?4)",
            params![record.session, idx as i64, p1, p2],
        )
        .context("insert set row")?;
    }
    tx.commit().context("commit match transaction")?;
    Ok(())
}

pub fn load_recent_matches(conn: &Connection, limit: usize) -> Result<Vec<StoredMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT session, player1, player2, starting_server, winner, sets_p1, sets_p2, updated_at
            FROM matches
            ORDER BY updated_at DESC
            LIMIT ?1
            "#,
        )
        .context("prepare match query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(StoredMatch {
                session: row.get(0)?,
                player1: row.get(1)?,
                player2: row.get(2)?,
                starting_server: row.get(3)?,
                winner: row.get(4)?,
                sets_p1: row.get(5)?,
                sets_p2: row.get(6)?,
                updated_at: row.get(7)?,
                sets: Vec::new(),
            })
        })
        .context("query matches")?;

    let mut out = Vec::new();
    for row in rows {
        let mut m = row.context("read match row")?;
        m.sets = load_sets(conn, &m.session)?;
        out.push(m);
    }
    Ok(out)
}

fn load_sets(conn: &Connection, session: &str) -> Result<Vec<SetResult>> {
    let mut stmt = conn
        .prepare(
            "SELECT player1_points, player2_points FROM sets WHERE session = ?1 ORDER BY set_index",
        )
        .context("prepare set query")?;
    let rows = stmt
        .query_map(params![session], |row| {
            Ok(SetResult {
                player1: row.get(0)?,
                player2: row.get(1)?,
            })
        })
        .context("query sets")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read set row")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::PersistedSet;

    fn record(sets: &[(i64, i64)]) -> MatchRecord {
        MatchRecord {
            session: "m1".to_string(),
            starting_server: Some(Player::One),
            current_set: Vec::new(),
            completed_sets: sets
                .iter()
                .map(|(a, b)| PersistedSet {
                    player1: *a,
                    player2: *b,
                    points: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn record_match_upserts_and_rewrites_sets() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let rules = MatchRules::default();

        record_match(&mut conn, &record(&[(11, 4), (9, 11)]), &rules, "Ana", "Bo").unwrap();
        record_match(&mut conn, &record(&[(11, 4)]), &rules, "Ana", "Bo").unwrap();

        let rows = load_recent_matches(&conn, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sets.len(), 1);
        assert_eq!(rows[0].sets_p1, 1);
        assert_eq!(rows[0].winner, None);
        assert_eq!(rows[0].score_line(), "11-4");
    }

    #[test]
    fn winner_is_recorded_after_three_sets() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        record_match(
            &mut conn,
            &record(&[(8, 11), (11, 13), (4, 11)]),
            &MatchRules::default(),
            "Ana",
            "Bo",
        )
        .unwrap();
        let rows = load_recent_matches(&conn, 10).unwrap();
        assert_eq!(rows[0].winner, Some(2));
        assert_eq!(rows[0].sets_p2, 3);
        assert_eq!(rows[0].starting_server, Some(1));
    }
}
