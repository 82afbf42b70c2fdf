//! Subcommands of the `squaro-agent` binary.

pub mod compact;
pub mod inspect;
pub mod run;
