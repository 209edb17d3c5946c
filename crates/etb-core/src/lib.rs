//! Core domain + application logic for the expense Telegram bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port
//! and is implemented in the adapter crate; storage lives behind the ledger port.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod money;
pub mod parsing;
pub mod report;
pub mod scheduler;
pub mod security;
pub mod stats;
pub mod timezone;
pub mod utils;

pub use errors::{Error, Result};
