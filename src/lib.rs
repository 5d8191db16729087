pub mod config;
pub mod engine;
pub mod history;
pub mod match_db;
pub mod persist;
pub mod reconstruct;
pub mod remote;
pub mod rotation;
pub mod rules;
pub mod scoreboard;
pub mod snapshot;
pub mod state;
pub mod telemetry;
