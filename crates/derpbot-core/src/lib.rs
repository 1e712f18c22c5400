//! Core domain + application logic for derpbot.
//!
//! This crate is framework-agnostic. The chat platform lives behind
//! [`messaging::port::MessagingPort`], implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod store;

pub use errors::{Error, Result};
