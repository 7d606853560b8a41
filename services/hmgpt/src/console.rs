//! Interactive console for a single encounter.
//!
//! The console is generic over its input and output so the whole loop can be
//! driven from memory in tests.

use anyhow::Result;
use hmgpt_core::{
    Command,
    encounter::{Encounter, EncounterSummary, FAREWELL},
    library::PersonaLibrary,
    llm_client::ChatClient,
    persona::AlgorithmVariant,
    wrap::{DEFAULT_WIDTH, wrap},
};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::error;

const YOU: &str = "(You) >>> ";
const PATIENT: &str = "(Patient): ";

#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub width: usize,
    pub reveal: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            reveal: false,
        }
    }
}

/// Runs the encounter until the trainee says the farewell or input ends.
///
/// A failed model call is reported inline and the trainee may try again.
pub async fn run<R, W>(
    encounter: &mut Encounter,
    client: &dyn ChatClient,
    input: R,
    out: &mut W,
    options: &ConsoleOptions,
) -> Result<EncounterSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "\n(Type \"{}\" to end the conversation.)\n", FAREWELL)?;
    let opening = encounter.opening();
    writeln!(out, "{}{}", YOU, opening[0].content)?;
    write_patient(out, &opening[1].content, options.width)?;
    writeln!(out)?;

    let mut lines = input.lines();
    let summary = loop {
        write!(out, "{}", YOU)?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break encounter.summary();
        };
        if line.trim().is_empty() {
            continue;
        }

        match encounter.respond(client, &line).await {
            Ok(Command::PatientReply(reply)) => {
                write_patient(out, &reply, options.width)?;
                writeln!(out)?;
            }
            Ok(Command::EncounterComplete(summary)) => break summary,
            Err(e) => {
                error!(error = ?e, "Patient reply failed");
                writeln!(out, "(Patient is unavailable: {:#})\n", e)?;
            }
        }
    };

    writeln!(
        out,
        "\nEncounter ended after {} exchange(s).",
        summary.exchanges
    )?;
    if options.reveal {
        writeln!(out, "Diagnosis: {}", encounter.persona().diagnosis)?;
    }
    out.flush()?;
    Ok(summary)
}

/// Prints a reply with the patient prefix on its first wrapped line.
fn write_patient<W: Write>(out: &mut W, reply: &str, width: usize) -> std::io::Result<()> {
    let mut lines = wrap(reply, width).into_iter();
    writeln!(out, "{}{}", PATIENT, lines.next().unwrap_or_default())?;
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Lists personas for the trainee. Diagnoses are deliberately left out.
pub fn write_persona_table<W: Write>(
    out: &mut W,
    library: &PersonaLibrary,
    variant: Option<AlgorithmVariant>,
) -> std::io::Result<()> {
    let personas = match variant {
        Some(v) => library.by_variant(v),
        None => library.list(),
    };
    writeln!(
        out,
        "{:<28} {:<14} {:<18} {}",
        "ID", "VARIANT", "ALGORITHM", "PATIENT"
    )?;
    for p in personas {
        writeln!(
            out,
            "{:<28} {:<14} {:<18} {}",
            p.id,
            p.variant.to_string(),
            p.algorithm,
            p.name
        )?;
    }
    Ok(())
}
