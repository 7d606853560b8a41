//! Core of the standardized patient simulator: configuration, personas, the
//! encounter state machine and the chat-completion client it talks through.

pub mod config;
pub mod encounter;
pub mod library;
pub mod llm_client;
pub mod message;
pub mod persona;
pub mod wrap;

use encounter::EncounterSummary;

/// Represents what a front end should do after a trainee turn.
///
/// This enum decouples the encounter's decisions from how a runtime
/// presents them (a terminal today, possibly a web client later).
#[derive(Debug, Clone)]
pub enum Command {
    /// Show the patient's reply to the trainee.
    PatientReply(String),
    /// The trainee ended the encounter.
    EncounterComplete(EncounterSummary),
}
