//! CLI module for the class synchronization tool.
//!
//! This module provides the command-line interface for managing
//! Strigo classes.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, DEFAULT_CONFIG_FILE};
pub use output::OutputFormatter;
