//! Standardized patient personas.
//!
//! A persona pairs a patient identity with a concealed diagnosis and the
//! clinical algorithm variant it exercises. The persona owns the prompt text
//! that frames the chat model and keeps it from giving the diagnosis away.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised while validating or looking up personas.
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("Invalid persona '{id}': {reason}")]
    Invalid { id: String, reason: String },
    #[error("Duplicate persona id: {0}")]
    Duplicate(String),
    #[error("No persona matches '{0}'")]
    NotFound(String),
    #[error("Unknown algorithm variant '{0}' (expected uncomplicated, complicated or red-flag)")]
    UnknownVariant(String),
    #[error("Could not read persona file {path}: {message}")]
    Load { path: String, message: String },
}

/// The variant of a clinical algorithm a persona is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmVariant {
    Uncomplicated,
    Complicated,
    RedFlag,
}

impl AlgorithmVariant {
    pub const ALL: [AlgorithmVariant; 3] = [
        AlgorithmVariant::Uncomplicated,
        AlgorithmVariant::Complicated,
        AlgorithmVariant::RedFlag,
    ];
}

impl fmt::Display for AlgorithmVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmVariant::Uncomplicated => write!(f, "uncomplicated"),
            AlgorithmVariant::Complicated => write!(f, "complicated"),
            AlgorithmVariant::RedFlag => write!(f, "red-flag"),
        }
    }
}

impl FromStr for AlgorithmVariant {
    type Err = PersonaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "uncomplicated" => Ok(AlgorithmVariant::Uncomplicated),
            "complicated" => Ok(AlgorithmVariant::Complicated),
            "red-flag" | "redflag" => Ok(AlgorithmVariant::RedFlag),
            _ => Err(PersonaError::UnknownVariant(s.to_string())),
        }
    }
}

/// A simulated patient the chat model is asked to play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPersona {
    /// Unique identifier, e.g. `abdominal-pain-uncomplicated`.
    pub id: String,
    /// How the trainee addresses the patient, e.g. "Mr. Jones".
    pub name: String,
    /// The clinical algorithm this encounter exercises.
    pub algorithm: String,
    pub variant: AlgorithmVariant,
    /// The concealed diagnosis the trainee has to work out.
    pub diagnosis: String,
    /// Extra framing appended to the system prompt (history, demeanour, symptoms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
    /// The patient's first line of the encounter.
    pub opening_line: String,
    /// Words the patient must never say. Falls back to the diagnosis.
    #[serde(default)]
    pub forbidden_terms: Vec<String>,
}

impl PatientPersona {
    /// Checks that every required field carries text.
    pub fn validate(&self) -> Result<(), PersonaError> {
        let blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(PersonaError::Invalid {
                    id: self.id.clone(),
                    reason: format!("'{}' must not be empty", field),
                })
            } else {
                Ok(())
            }
        };
        blank("id", &self.id)?;
        blank("name", &self.name)?;
        blank("algorithm", &self.algorithm)?;
        blank("diagnosis", &self.diagnosis)?;
        blank("opening_line", &self.opening_line)?;
        if self.forbidden_terms.iter().any(|t| t.trim().is_empty()) {
            return Err(PersonaError::Invalid {
                id: self.id.clone(),
                reason: "forbidden terms must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The terms the reminder forbids and the leak check looks for.
    pub fn effective_forbidden_terms(&self) -> Vec<&str> {
        if self.forbidden_terms.is_empty() {
            vec![self.diagnosis.as_str()]
        } else {
            self.forbidden_terms.iter().map(String::as_str).collect()
        }
    }

    /// The system prompt that casts the model as this patient.
    pub fn framing_prompt(&self) -> String {
        let mut prompt = format!(
            "You are a teacher who is pretending to be a sick patient in order to \
             teach medics how to interact with patients. \
             Today you will be pretending to be {}, and your diagnosis is {}. \
             Remember not to give too many hints about your diagnosis. \
             The student must figure out the diagnosis based on your symptoms. \
             Do not tell the student your diagnosis, even if they ask.",
            self.name, self.diagnosis
        );
        if let Some(presentation) = self.presentation.as_deref().map(str::trim) {
            if !presentation.is_empty() {
                prompt.push(' ');
                prompt.push_str(presentation);
            }
        }
        prompt
    }

    /// The reminder appended after every trainee turn.
    pub fn reminder_prompt(&self) -> String {
        let terms = self
            .effective_forbidden_terms()
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "As a reminder, no matter what you say, please do not use the words {}.",
            terms
        )
    }

    /// The trainee's scripted introduction that opens the encounter.
    pub fn trainee_greeting(&self, trainee: &str) -> String {
        format!(
            "Hello {}, my name is {}, I am a medic here to help you.",
            self.name, trainee
        )
    }

    /// Returns the forbidden terms that appear in `reply`, ignoring case.
    pub fn find_leaks(&self, reply: &str) -> Vec<String> {
        let haystack = reply.to_lowercase();
        self.effective_forbidden_terms()
            .into_iter()
            .filter(|term| haystack.contains(&term.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn sample_persona() -> PatientPersona {
    PatientPersona {
        id: "abdominal-pain-uncomplicated".to_string(),
        name: "Mr. Jones".to_string(),
        algorithm: "abdominal pain".to_string(),
        variant: AlgorithmVariant::Uncomplicated,
        diagnosis: "acute appendicitis".to_string(),
        presentation: None,
        opening_line: "Hello, my name is Mr. Jones, and I do not know what is going on with me."
            .to_string(),
        forbidden_terms: vec!["appendicitis".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trips_through_text() {
        for variant in AlgorithmVariant::ALL {
            assert_eq!(variant.to_string().parse::<AlgorithmVariant>().unwrap(), variant);
        }
        assert_eq!(
            "Red_Flag".parse::<AlgorithmVariant>().unwrap(),
            AlgorithmVariant::RedFlag
        );
        assert!(matches!(
            "severe".parse::<AlgorithmVariant>(),
            Err(PersonaError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_variant_serde_is_kebab_case() {
        let json = serde_json::to_string(&AlgorithmVariant::RedFlag).unwrap();
        assert_eq!(json, "\"red-flag\"");
    }

    #[test]
    fn test_framing_names_patient_and_diagnosis() {
        let persona = sample_persona();
        let framing = persona.framing_prompt();
        assert!(framing.contains("pretending to be Mr. Jones"));
        assert!(framing.contains("your diagnosis is acute appendicitis"));
        assert!(framing.ends_with("even if they ask."));
    }

    #[test]
    fn test_framing_appends_presentation() {
        let mut persona = sample_persona();
        persona.presentation = Some("You are 34 and work as a plumber.".to_string());
        assert!(
            persona
                .framing_prompt()
                .ends_with("even if they ask. You are 34 and work as a plumber.")
        );
    }

    #[test]
    fn test_reminder_quotes_terms() {
        let persona = sample_persona();
        assert_eq!(
            persona.reminder_prompt(),
            "As a reminder, no matter what you say, please do not use the words \"appendicitis\"."
        );

        let mut persona = sample_persona();
        persona.forbidden_terms.clear();
        assert!(persona.reminder_prompt().contains("\"acute appendicitis\""));
    }

    #[test]
    fn test_trainee_greeting() {
        assert_eq!(
            sample_persona().trainee_greeting("Chris"),
            "Hello Mr. Jones, my name is Chris, I am a medic here to help you."
        );
    }

    #[test]
    fn test_find_leaks_ignores_case() {
        let persona = sample_persona();
        assert_eq!(
            persona.find_leaks("It might be Appendicitis, doctor."),
            vec!["appendicitis".to_string()]
        );
        assert!(persona.find_leaks("My belly hurts on the right.").is_empty());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut persona = sample_persona();
        assert!(persona.validate().is_ok());

        persona.diagnosis = "  ".to_string();
        match persona.validate().unwrap_err() {
            PersonaError::Invalid { reason, .. } => assert!(reason.contains("diagnosis")),
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }
}
