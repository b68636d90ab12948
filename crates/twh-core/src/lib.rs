//! Core domain + application logic for the tweet admission bot.
//!
//! This crate is intentionally framework-agnostic. The social network, the link
//! shortener and the language classifier live behind ports (traits) implemented in
//! adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod ports;
pub mod store;
pub mod supervisor;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
