//! Credential and model configuration.
//!
//! Settings are read from a dotenv-style file, `.hmgpt_env_vars` by default,
//! which must define `HMGPT_API_KEY` and `HMGPT_ORG`. The file is parsed in
//! isolation: nothing is merged into the process environment, and values
//! that dotenvy would expand from it (an unquoted or double-quoted `$`) are
//! rejected. Single-quoted values are taken literally.

use async_openai::config::OpenAIConfig;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENV_FILE: &str = ".hmgpt_env_vars";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";

pub const API_KEY_VAR: &str = "HMGPT_API_KEY";
pub const ORG_VAR: &str = "HMGPT_ORG";
pub const MODEL_VAR: &str = "HMGPT_MODEL";
pub const TEMPERATURE_VAR: &str = "HMGPT_TEMPERATURE";
pub const API_BASE_VAR: &str = "HMGPT_API_BASE";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Could not read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed entry '{key}' on line {line} of configuration file")]
    Parse { key: String, line: usize },
    #[error("Missing configuration variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for configuration variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds everything needed to talk to the chat-completion API.
#[derive(Debug)]
pub struct Config {
    pub api_key: SecretString,
    pub organization: String,
    pub model: String,
    pub temperature: f32,
    pub api_base: Option<String>,
}

impl Config {
    /// Loads configuration from the env file at `path`.
    ///
    /// Both `HMGPT_API_KEY` and `HMGPT_ORG` must be present and non-blank,
    /// otherwise startup is rejected with [`ConfigError::MissingVar`].
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let vars = read_env_file(path.as_ref())?;
        Self::from_vars(&vars)
    }

    /// Builds a configuration from already-parsed key/value pairs.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_key = required(vars, API_KEY_VAR)?;
        let organization = required(vars, ORG_VAR)?;

        let model = optional(vars, MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match optional(vars, TEMPERATURE_VAR) {
            Some(raw) => {
                let value = raw.parse::<f32>().map_err(|_| {
                    ConfigError::InvalidValue(
                        TEMPERATURE_VAR.to_string(),
                        format!("'{}' is not a number", raw),
                    )
                })?;
                if !(0.0..=2.0).contains(&value) {
                    return Err(ConfigError::InvalidValue(
                        TEMPERATURE_VAR.to_string(),
                        format!("{} is outside the range 0 to 2", value),
                    ));
                }
                value
            }
            None => 0.0,
        };

        let api_base = optional(vars, API_BASE_VAR);

        Ok(Self {
            api_key: SecretString::from(api_key),
            organization,
            model,
            temperature,
            api_base,
        })
    }

    /// Overrides the model named in the env file.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Produces the client configuration for an OpenAI-compatible API.
    pub fn openai_config(&self) -> OpenAIConfig {
        let config = OpenAIConfig::new()
            .with_api_key(self.api_key.expose_secret())
            .with_org_id(&self.organization);
        match &self.api_base {
            Some(base) => config.with_api_base(base),
            None => config,
        }
    }

    /// The API key with everything but its last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.expose_secret();
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let entries = scan_entries(&contents);
    if let Some(entry) = entries.iter().find(|e| e.expands) {
        return Err(ConfigError::InvalidValue(
            entry.key.clone(),
            "contains '$', which would be expanded; wrap the value in single quotes".to_string(),
        ));
    }

    let mut vars = HashMap::new();
    let mut parsed = 0;
    for item in dotenvy::from_read_iter(contents.as_bytes()) {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
                parsed += 1;
            }
            Err(dotenvy::Error::LineParse(..)) => {
                // Only the key and line are reported so a malformed secret is
                // never echoed back.
                return Err(match entries.get(parsed) {
                    Some(entry) => ConfigError::Parse {
                        key: entry.key.clone(),
                        line: entry.line,
                    },
                    None => ConfigError::Parse {
                        key: String::new(),
                        line: contents.lines().count(),
                    },
                });
            }
            Err(other) => {
                return Err(ConfigError::InvalidValue(
                    path.display().to_string(),
                    other.to_string(),
                ));
            }
        }
    }
    Ok(vars)
}

/// One logical entry of the env file as written, before dotenvy sees it.
#[derive(Debug, PartialEq)]
struct RawEntry {
    line: usize,
    key: String,
    expands: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits the file into entries the way dotenvy does, so the nth entry
/// dotenvy yields is the nth entry here. Quoted values may span lines.
fn scan_entries(contents: &str) -> Vec<RawEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<RawEntry> = None;
    let mut quote = Quote::None;

    for (index, line) in contents.lines().enumerate() {
        let mut entry = match pending.take() {
            Some(entry) => entry,
            None => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                RawEntry {
                    line: index + 1,
                    key: entry_key(trimmed),
                    expands: false,
                }
            }
        };
        scan_line(line, &mut quote, &mut entry.expands);
        if quote == Quote::None {
            entries.push(entry);
        } else {
            pending = Some(entry);
        }
    }
    entries.extend(pending);
    entries
}

/// Tracks quoting across `line` and flags any `$` dotenvy would substitute.
fn scan_line(line: &str, quote: &mut Quote, expands: &mut bool) {
    let mut escaped = false;
    let mut after_space = true;
    for c in line.chars() {
        match *quote {
            Quote::Single => {
                if c == '\'' {
                    *quote = Quote::None;
                }
            }
            _ if escaped => escaped = false,
            Quote::Double => match c {
                '\\' => escaped = true,
                '"' => *quote = Quote::None,
                '$' => *expands = true,
                _ => {}
            },
            Quote::None => match c {
                '\\' => escaped = true,
                '\'' => *quote = Quote::Single,
                '"' => *quote = Quote::Double,
                '$' => *expands = true,
                '#' if after_space => break,
                _ => {}
            },
        }
        after_space = c.is_whitespace();
    }
}

/// The leading identifier of an entry, or an empty string if it has none.
fn entry_key(line: &str) -> String {
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
    let key: String = line
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    match key.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => key,
        _ => String::new(),
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    optional(vars, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn optional(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
