//! MockCheck CLI
//!
//! Command-line interface for running fixture verification scenarios.

pub mod commands;
pub mod output;
pub mod settings;
