//! CLI infrastructure for the squaro agent
//!
//! This module provides the command-line interface for driving a game over
//! stdin/stdout and for inspecting and compacting saved value tables.

pub mod commands;
pub mod config;
pub mod output;
