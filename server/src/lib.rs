//! Courier Server
//!
//! Periodically delivers queued messages to an external webhook and exposes
//! an HTTP API to start/stop delivery and browse sent messages.

pub mod api;
pub mod config;
pub mod db;
pub mod delivery;
