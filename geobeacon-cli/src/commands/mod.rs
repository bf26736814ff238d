//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`encode`] - Print one report line
//! - [`run`] - Main command (track and report until Ctrl-C)
//! - [`sms`] - Print the SMS fallback message

pub mod config;
pub mod encode;
pub mod run;
pub mod sms;
