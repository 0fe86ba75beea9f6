//! # User Interface
//!
//! Colored terminal output, mirrored to an optional log file.

pub mod log;

pub use log::{banner, debug, error, header, info, path_link, success, warn, Log};
