//! Main Entrypoint for the HMGPT Terminal Simulator
//!
//! This binary is responsible for:
//! 1. Parsing arguments and initializing logging.
//! 2. Assembling the persona library (built-in plus an optional directory).
//! 3. Loading credentials from the env file.
//! 4. Running an encounter on the terminal.

use anyhow::Context;
use clap::Parser;
use hmgpt::{
    args::{Args, Commands},
    console::{self, ConsoleOptions},
};
use hmgpt_core::{
    config::Config, encounter::Encounter, library::PersonaLibrary,
    llm_client::OpenAICompatibleClient,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so they never interleave with the conversation.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}

fn load_library(args: &Args) -> anyhow::Result<PersonaLibrary> {
    let mut library = PersonaLibrary::builtin().context("Built-in personas are invalid")?;
    if let Some(dir) = &args.personas_dir {
        let extra = PersonaLibrary::load_dir(dir)
            .with_context(|| format!("Failed to load personas from {}", dir.display()))?;
        library.extend(extra)?;
    }
    Ok(library)
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = Config::from_env_file(&args.env_file).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.env_file.display()
        )
    })?;
    Ok(match &args.model {
        Some(model) => config.with_model(model),
        None => config,
    })
}

async fn chat(args: &Args) -> anyhow::Result<()> {
    // --- 1. Resolve the persona before touching credentials ---
    let library = load_library(args)?;
    let persona = library.resolve(&args.persona)?.clone();

    // --- 2. Load Configuration ---
    let config = load_config(args)?;
    info!(
        persona = %persona.id,
        variant = %persona.variant,
        model = %config.model,
        "Configuration loaded. Starting encounter..."
    );

    // --- 3. Initialize the chat client ---
    let client = OpenAICompatibleClient::new(
        config.openai_config(),
        config.model.clone(),
        config.temperature,
    );

    // --- 4. Run the encounter ---
    let mut encounter = Encounter::new(persona, &args.trainee);
    let options = ConsoleOptions {
        width: usize::from(args.width),
        reveal: args.reveal,
    };
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let summary = console::run(&mut encounter, &client, stdin, &mut stdout, &options).await?;

    info!(
        exchanges = summary.exchanges,
        diagnosis_leaks = summary.diagnosis_leaks,
        "Encounter finished"
    );
    Ok(())
}

fn check_config(args: &Args) -> anyhow::Result<()> {
    let config = load_config(args)?;
    println!("Configuration OK: {}", args.env_file.display());
    println!("  organization: {}", config.organization);
    println!("  api key:      {}", config.masked_api_key());
    println!("  model:        {}", config.model);
    println!("  temperature:  {}", config.temperature);
    if let Some(base) = &config.api_base {
        println!("  api base:     {}", base);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command.clone().unwrap_or(Commands::Chat) {
        Commands::Chat => chat(&args).await,
        Commands::Personas { variant } => {
            let library = load_library(&args)?;
            console::write_persona_table(&mut std::io::stdout(), &library, variant)?;
            Ok(())
        }
        Commands::CheckConfig => check_config(&args),
    }
}
