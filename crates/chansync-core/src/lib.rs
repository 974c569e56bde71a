//! Core domain + application logic for the channel sync bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate.

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod forwarder;
pub mod logging;
pub mod messaging;
pub mod pending;
pub mod resolver;
pub mod store;

pub use errors::{Error, Result};
