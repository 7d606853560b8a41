//! HMGPT Terminal Front End
//!
//! Command-line parsing and the interactive console that lets a trainee
//! interview a standardized patient. The `main.rs` binary is a thin wrapper
//! around this library.

pub mod args;
pub mod console;
