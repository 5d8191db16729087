use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::snapshot::ScoreboardView;
use crate::state::Delta;

const PUSH_TIMEOUT: Duration = Duration::from_secs(2);

static CLIENT: OnceCell<Client> = OnceCell::new();

fn telemetry_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(PUSH_TIMEOUT)
            .connect_timeout(PUSH_TIMEOUT)
            .user_agent(concat!("tt_scoreboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build telemetry client")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryFrame {
    pub session: String,
    pub view: ScoreboardView,
}

#[derive(Debug, Serialize)]
struct TelemetryBody<'a> {
    session: &'a str,
    view: &'a ScoreboardView,
    topics: Vec<(String, String)>,
}

/// Flat status topics mirroring the scoreboard, relative to the configured prefix.
pub fn status_topics(view: &ScoreboardView, prefix: &str) -> Vec<(String, String)> {
    let set_scores = view
        .set_scores
        .iter()
        .map(|slot| match slot {
            Some(s) => format!("{}:{}", s.left, s.right),
            None => "-:-".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",");
    vec![
        (format!("{prefix}status/left_points"), view.left_points.to_string()),
        (format!("{prefix}status/right_points"), view.right_points.to_string()),
        (format!("{prefix}status/left_sets"), view.left_sets.to_string()),
        (format!("{prefix}status/right_sets"), view.right_sets.to_string()),
        (format!("{prefix}status/set_scores"), set_scores),
        (format!("{prefix}status/match_active"), view.match_active.to_string()),
        (format!("{prefix}status/change_sides"), view.change_sides.to_string()),
        (
            format!("{prefix}status/change_sides_anim"),
            view.change_sides_anim.to_string(),
        ),
    ]
}

/// Publishes the most recent frame at a fixed interval. Failures are logged and dropped.
pub fn spawn_telemetry_publisher(
    url: String,
    prefix: String,
    interval: Duration,
    frames: Receiver<TelemetryFrame>,
    log_tx: Sender<Delta>,
) {
    thread::spawn(move || {
        let mut latest: Option<TelemetryFrame> = None;
        let mut published: Option<TelemetryFrame> = None;
        let mut failing = false;
        let mut last_push = backdated(interval);

        loop {
            let wait = interval
                .checked_sub(last_push.elapsed())
                .unwrap_or(Duration::ZERO);
            match frames.recv_timeout(wait) {
                Ok(frame) => {
                    latest = Some(frame);
                    if last_push.elapsed() < interval {
                        continue;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            last_push = Instant::now();

            let Some(frame) = latest.as_ref() else {
                continue;
            };
            if published.as_ref() == Some(frame) {
                continue;
            }
            match post_frame(&url, &prefix, frame) {
                Ok(()) => {
                    if failing {
                        let _ = log_tx.send(Delta::Log("[INFO] Telemetry recovered".to_string()));
                    }
                    failing = false;
                    published = Some(frame.clone());
                }
                Err(err) => {
                    if !failing {
                        let _ = log_tx.send(Delta::Log(format!("[WARN] Telemetry push failed: {err}")));
                    }
                    failing = true;
                }
            }
        }
    });
}

// Lets the first frame go out immediately; falls back to now when the clock cannot go that far back.
fn backdated(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_sub(interval).unwrap_or(now)
}

fn post_frame(url: &str, prefix: &str, frame: &TelemetryFrame) -> Result<()> {
    let client = telemetry_client()?;
    let body = TelemetryBody {
        session: &frame.session,
        view: &frame.view,
        topics: status_topics(&frame.view, prefix),
    };
    let resp = client.post(url).json(&body).send().context("request failed")?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("http {status}"));
    }
    Ok(())
}
