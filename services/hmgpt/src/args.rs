//! Command-line argument parsing.

use clap::{ArgAction, Parser, Subcommand};
use hmgpt_core::{
    config::DEFAULT_ENV_FILE, library::DEFAULT_PERSONA_ID, persona::AlgorithmVariant,
};
use std::path::PathBuf;

/// Interview an AI standardized patient from the terminal
#[derive(Parser, Debug)]
#[command(name = "hmgpt", version)]
pub struct Args {
    /// File holding HMGPT_API_KEY and HMGPT_ORG
    #[arg(long, default_value = DEFAULT_ENV_FILE, global = true)]
    pub env_file: PathBuf,

    /// Persona id, or a name/algorithm/variant to search for
    #[arg(short, long, default_value = DEFAULT_PERSONA_ID, global = true)]
    pub persona: String,

    /// Directory of additional persona JSON files
    #[arg(long, global = true)]
    pub personas_dir: Option<PathBuf>,

    /// How the trainee introduces themselves
    #[arg(short, long, default_value = "Chris", global = true)]
    pub trainee: String,

    /// Chat model to use instead of the one in the env file
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Wrap patient replies to this many columns
    #[arg(
        long,
        default_value_t = 80,
        value_parser = clap::value_parser!(u16).range(20..=400),
        global = true
    )]
    pub width: u16,

    /// Show the diagnosis when the encounter ends
    #[arg(long, global = true)]
    pub reveal: bool,

    /// Verbosity: -v (info), -vv (debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start an encounter (default)
    Chat,
    /// List available personas without revealing diagnoses
    Personas {
        /// Only show personas for this algorithm variant
        #[arg(long)]
        variant: Option<AlgorithmVariant>,
    },
    /// Validate the env file without contacting the API
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["hmgpt"]).unwrap();
        assert_eq!(args.env_file, PathBuf::from(".hmgpt_env_vars"));
        assert_eq!(args.persona, DEFAULT_PERSONA_ID);
        assert_eq!(args.trainee, "Chris");
        assert_eq!(args.width, 80);
        assert!(!args.reveal);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_personas_subcommand_parses_variant() {
        let args = Args::try_parse_from(["hmgpt", "personas", "--variant", "red-flag"]).unwrap();
        assert_eq!(
            args.command,
            Some(Commands::Personas {
                variant: Some(AlgorithmVariant::RedFlag)
            })
        );
    }

    #[test]
    fn test_width_is_range_checked() {
        assert!(Args::try_parse_from(["hmgpt", "--width", "10"]).is_err());
        let args = Args::try_parse_from(["hmgpt", "--width", "100", "-vv"]).unwrap();
        assert_eq!(args.width, 100);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_global_env_file_after_subcommand() {
        let args =
            Args::try_parse_from(["hmgpt", "check-config", "--env-file", "/tmp/creds"]).unwrap();
        assert_eq!(args.env_file, PathBuf::from("/tmp/creds"));
        assert_eq!(args.command, Some(Commands::CheckConfig));
    }

    #[test]
    fn test_chat_options_after_chat_subcommand() {
        let args = Args::try_parse_from([
            "hmgpt",
            "chat",
            "--persona",
            "red-flag",
            "--reveal",
            "-t",
            "Sam",
            "--width",
            "60",
            "-m",
            "gpt-4o",
        ])
        .unwrap();
        assert_eq!(args.command, Some(Commands::Chat));
        assert_eq!(args.persona, "red-flag");
        assert!(args.reveal);
        assert_eq!(args.trainee, "Sam");
        assert_eq!(args.width, 60);
        assert_eq!(args.model.as_deref(), Some("gpt-4o"));
        assert!(Args::try_parse_from(["hmgpt", "chat", "--width", "10"]).is_err());
    }
}
