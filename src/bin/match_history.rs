use std::path::PathBuf;

use anyhow::{Context, Result};

use tt_scoreboard::match_db;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg()
        .or_else(|| std::env::var("SCOREBOARD_DB").ok().map(PathBuf::from))
        .or_else(match_db::default_db_path)
        .context("unable to resolve sqlite path")?;
    let limit = parse_limit_arg().unwrap_or(20);

    let conn = match_db::open_db(&db_path)?;
    let matches = match_db::load_recent_matches(&conn, limit)?;

    println!("Match history");
    println!("DB: {}", db_path.display());
    if matches.is_empty() {
        println!("No matches recorded");
        return Ok(());
    }
    for m in &matches {
        let status = match m.winner {
            Some(1) => format!("{} won", m.player1),
            Some(2) => format!("{} won", m.player2),
            _ => "unfinished".to_string(),
        };
        println!(
            "{}  {} vs {}  sets {}-{}  [{}]  {}",
            m.updated_at, m.player1, m.player2, m.sets_p1, m.sets_p2, m.score_line(), status
        );
    }

    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn parse_limit_arg() -> Option<usize> {
    std::env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix("--limit=").and_then(|v| v.trim().parse().ok()))
}
