use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{Context, Result};

use crate::config::normalize_prefix;
use crate::state::Delta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    PointLeft,
    PointRight,
    RemovePoint,
    SetP1Name(String),
    SetP2Name(String),
    SetChangeSides(bool),
    SetChangeSidesAnim(bool),
}

/// Maps a `<prefix>control/<name>` message to a command. Unknown topics are ignored.
pub fn decode(topic: &str, payload: &str, prefix: &str) -> Option<RemoteCommand> {
    let prefix = normalize_prefix(prefix);
    let sub_topic = topic.strip_prefix(prefix.as_str()).unwrap_or(topic);
    let sub_topic = sub_topic.strip_prefix("control/").unwrap_or(sub_topic);

    match sub_topic {
        "point_left" => Some(RemoteCommand::PointLeft),
        "point_right" => Some(RemoteCommand::PointRight),
        "remove_point" => Some(RemoteCommand::RemovePoint),
        "p1_name" => Some(RemoteCommand::SetP1Name(payload.to_string())),
        "p2_name" => Some(RemoteCommand::SetP2Name(payload.to_string())),
        "change_sides" => Some(RemoteCommand::SetChangeSides(is_truthy(payload))),
        "change_sides_anim" => Some(RemoteCommand::SetChangeSidesAnim(is_truthy(payload))),
        _ => None,
    }
}

fn is_truthy(payload: &str) -> bool {
    payload.eq_ignore_ascii_case("on") || payload == "true" || payload == "1"
}

/// Splits one wire line into `(topic, payload)`; the payload may be empty.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => Some((topic, payload.trim())),
        None => Some((line, "")),
    }
}

/// Accepts line-oriented control connections and forwards decoded commands to the main loop.
pub fn spawn_remote_listener(addr: &str, prefix: String, tx: Sender<Delta>) -> Result<()> {
    let listener =
        TcpListener::bind(addr).with_context(|| format!("bind remote listener on {addr}"))?;
    let _ = tx.send(Delta::Log(format!("[INFO] Remote control listening on {addr}")));

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tx = tx.clone();
                    let prefix = prefix.clone();
                    thread::spawn(move || serve_connection(stream, &prefix, &tx));
                }
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!("[WARN] Remote accept error: {err}")));
                }
            }
        }
    });
    Ok(())
}

fn serve_connection(stream: TcpStream, prefix: &str, tx: &Sender<Delta>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let Some((topic, payload)) = parse_line(&line) else {
            continue;
        };
        if let Some(cmd) = decode(topic, payload, prefix)
            && tx.send(Delta::Remote(cmd)).is_err()
        {
            return;
        }
    }
    let _ = tx.send(Delta::Log(format!("[INFO] Remote client {peer} disconnected")));
}
