//! Warden moderation console: telemetry setup, the chat platform executor and
//! the admin CLI built on [`warden_moderation`].

pub mod cli;
pub mod platform;
pub mod telemetry;
