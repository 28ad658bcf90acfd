//! Logging and configuration helpers.

pub mod config;
pub mod logging;
