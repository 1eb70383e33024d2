//! Core domain + application logic for the warden group bot.
//!
//! This crate is intentionally platform-agnostic. The chat platform and the
//! persistence layer live behind ports (traits) implemented in adapter
//! crates; the core receives already-parsed events and issues typed actions.

mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod policy;
pub mod poll;
pub mod ports;
pub mod roster;
pub mod settings;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Error, Result};
