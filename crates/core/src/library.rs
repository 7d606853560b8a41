//! Persona Library
//!
//! Collects standardized patient personas from one or more sources (the
//! built-in set shipped with the crate, or a directory of JSON files) and
//! resolves trainee-supplied queries against them.

use crate::persona::{AlgorithmVariant, PatientPersona, PersonaError};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BUILTIN_PERSONAS: [(&str, &str); 3] = [
    (
        "abdominal-pain-uncomplicated.json",
        include_str!("../personas/abdominal-pain-uncomplicated.json"),
    ),
    (
        "abdominal-pain-complicated.json",
        include_str!("../personas/abdominal-pain-complicated.json"),
    ),
    (
        "abdominal-pain-red-flag.json",
        include_str!("../personas/abdominal-pain-red-flag.json"),
    ),
];

/// The persona used when the trainee does not pick one.
pub const DEFAULT_PERSONA_ID: &str = "abdominal-pain-uncomplicated";

/// Defines the contract for anything that can supply personas.
///
/// This lets the library be assembled from the personas compiled into the
/// binary, a directory of authored files, or a fixed list in tests.
pub trait PersonaSource {
    /// Loads every persona this source provides. Personas are validated by
    /// the library, not the source.
    fn load(&self) -> Result<Vec<PatientPersona>, PersonaError>;
}

/// The personas compiled into the crate.
pub struct BuiltinPersonas;

impl PersonaSource for BuiltinPersonas {
    fn load(&self) -> Result<Vec<PatientPersona>, PersonaError> {
        BUILTIN_PERSONAS
            .iter()
            .map(|(name, json)| parse_persona(name, json))
            .collect()
    }
}

/// A directory of `*.json` persona files.
pub struct PersonaDirectory {
    path: PathBuf,
}

impl PersonaDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersonaSource for PersonaDirectory {
    fn load(&self) -> Result<Vec<PatientPersona>, PersonaError> {
        let load_err = |path: &Path, message: String| PersonaError::Load {
            path: path.display().to_string(),
            message,
        };

        let mut files = Vec::new();
        let dir = self.path.as_path();
        let entries = std::fs::read_dir(dir).map_err(|e| load_err(dir, e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| load_err(dir, e.to_string()))?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        // Directory order is platform dependent.
        files.sort();

        files
            .iter()
            .map(|path| {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| load_err(path.as_path(), e.to_string()))?;
                parse_persona(&path.display().to_string(), &json)
            })
            .collect()
    }
}

fn parse_persona(origin: &str, json: &str) -> Result<PatientPersona, PersonaError> {
    serde_json::from_str(json).map_err(|e| PersonaError::Load {
        path: origin.to_string(),
        message: e.to_string(),
    })
}

/// A validated, id-indexed collection of personas.
#[derive(Debug, Clone, Default)]
pub struct PersonaLibrary {
    personas: BTreeMap<String, PatientPersona>,
}

impl PersonaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The personas compiled into the crate, one per algorithm variant.
    pub fn builtin() -> Result<Self, PersonaError> {
        Self::from_source(&BuiltinPersonas)
    }

    pub fn from_source(source: &dyn PersonaSource) -> Result<Self, PersonaError> {
        let mut library = Self::new();
        for persona in source.load()? {
            library.insert(persona)?;
        }
        Ok(library)
    }

    /// Loads every `*.json` persona in `path`.
    pub fn load_dir(path: impl Into<PathBuf>) -> Result<Self, PersonaError> {
        let path = path.into();
        let library = Self::from_source(&PersonaDirectory::new(&path))?;
        info!(path = %path.display(), count = library.len(), "Loaded persona directory");
        Ok(library)
    }

    /// Validates and adds a persona. Ids must be unique.
    pub fn insert(&mut self, persona: PatientPersona) -> Result<(), PersonaError> {
        persona.validate()?;
        if self.personas.contains_key(&persona.id) {
            return Err(PersonaError::Duplicate(persona.id));
        }
        debug!(id = %persona.id, variant = %persona.variant, "Registered persona");
        self.personas.insert(persona.id.clone(), persona);
        Ok(())
    }

    /// Merges `other` into this library, rejecting any id already present.
    pub fn extend(&mut self, other: PersonaLibrary) -> Result<(), PersonaError> {
        for persona in other.personas.into_values() {
            self.insert(persona)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PatientPersona> {
        self.personas.get(id)
    }

    /// Resolves a trainee query to a persona.
    ///
    /// An exact id wins. Otherwise the query is fuzzy-matched against each
    /// persona's id, name, algorithm and variant, and the best score is taken.
    pub fn resolve(&self, query: &str) -> Result<&PatientPersona, PersonaError> {
        let query = query.trim();
        if let Some(persona) = self.get(query) {
            return Ok(persona);
        }

        let matcher = SkimMatcherV2::default().ignore_case();
        let mut best: Option<(i64, &PatientPersona)> = None;
        for persona in self.list() {
            let haystack = format!(
                "{} {} {} {}",
                persona.id, persona.name, persona.algorithm, persona.variant
            );
            if let Some(score) = matcher.fuzzy_match(&haystack, query) {
                if best.is_none_or(|(top, _)| score > top) {
                    best = Some((score, persona));
                }
            }
        }

        match best {
            Some((score, persona)) => {
                info!(query, id = %persona.id, score, "Resolved persona by fuzzy match");
                Ok(persona)
            }
            None => Err(PersonaError::NotFound(query.to_string())),
        }
    }

    /// All personas, ordered by algorithm, then variant, then id.
    pub fn list(&self) -> Vec<&PatientPersona> {
        let mut personas: Vec<&PatientPersona> = self.personas.values().collect();
        personas.sort_by(|a, b| {
            (a.algorithm.as_str(), a.variant, a.id.as_str())
                .cmp(&(b.algorithm.as_str(), b.variant, b.id.as_str()))
        });
        personas
    }

    pub fn by_variant(&self, variant: AlgorithmVariant) -> Vec<&PatientPersona> {
        self.list()
            .into_iter()
            .filter(|p| p.variant == variant)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
