//! Intake desk: menu-driven customer intake over a chat transport.

pub mod channels;
pub mod config;
pub mod error;
pub mod intake;
