//! # Command Implementations
//!
//! Each submodule handles one CLI command.

pub mod clean;
pub mod identify;
pub mod remove;
pub mod run;
