//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod init;
pub mod ports;
pub mod relay;
pub mod send;
pub mod serve;
