//! Encounter State
//!
//! An encounter is one interview between a trainee and a standardized
//! patient. It owns the conversation and decides what is sent to the chat
//! model on each turn: the persona framing, the full history, and the
//! reminders that keep the model from naming its diagnosis.

use crate::Command;
use crate::llm_client::ChatClient;
use crate::message::ChatMessage;
use crate::persona::PatientPersona;
use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

/// The word that ends an encounter.
pub const FAREWELL: &str = "bye";

/// Returns true when the trainee's input ends the encounter.
pub fn is_farewell(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(FAREWELL)
}

/// Totals reported when an encounter ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterSummary {
    pub persona_id: String,
    /// Completed trainee/patient exchanges, not counting the scripted opening.
    pub exchanges: usize,
    /// Replies that contained at least one forbidden term.
    pub diagnosis_leaks: usize,
}

#[derive(Debug, Clone)]
pub struct Encounter {
    persona: PatientPersona,
    framing: Vec<ChatMessage>,
    history: Vec<ChatMessage>,
    reminders: Vec<ChatMessage>,
    exchanges: usize,
    diagnosis_leaks: usize,
}

impl Encounter {
    /// Starts an encounter with the scripted opening exchange: the trainee
    /// introduces themselves and the patient answers with its opening line.
    pub fn new(persona: PatientPersona, trainee: &str) -> Self {
        let framing = vec![ChatMessage::system(persona.framing_prompt())];
        let history = vec![
            ChatMessage::user(persona.trainee_greeting(trainee)),
            ChatMessage::assistant(persona.opening_line.clone()),
        ];
        let reminders = vec![ChatMessage::user(persona.reminder_prompt())];
        Self {
            persona,
            framing,
            history,
            reminders,
            exchanges: 0,
            diagnosis_leaks: 0,
        }
    }

    pub fn persona(&self) -> &PatientPersona {
        &self.persona
    }

    /// The scripted greeting and the patient's opening line.
    pub fn opening(&self) -> &[ChatMessage] {
        &self.history[..2]
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// The messages sent for the next turn: framing, history, then reminders.
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        self.framing
            .iter()
            .chain(self.history.iter())
            .chain(self.reminders.iter())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> EncounterSummary {
        EncounterSummary {
            persona_id: self.persona.id.clone(),
            exchanges: self.exchanges,
            diagnosis_leaks: self.diagnosis_leaks,
        }
    }

    /// Handles one line of trainee input.
    ///
    /// The farewell completes the encounter without contacting the model.
    /// Any other input is sent with the whole conversation and the reply is
    /// recorded. If the model call fails the input is not kept, so the
    /// trainee can simply ask again.
    #[instrument(skip_all, fields(persona = %self.persona.id, exchange = self.exchanges + 1))]
    pub async fn respond(&mut self, client: &dyn ChatClient, input: &str) -> Result<Command> {
        if is_farewell(input) {
            info!(exchanges = self.exchanges, "Trainee ended the encounter");
            return Ok(Command::EncounterComplete(self.summary()));
        }
        let input = input.trim();
        if input.is_empty() {
            bail!("Trainee input is empty");
        }

        self.history.push(ChatMessage::user(input));
        let reply = match client.complete(self.request_messages()).await {
            Ok(reply) => reply,
            Err(e) => {
                self.history.pop();
                return Err(e);
            }
        };

        let leaks = self.persona.find_leaks(&reply);
        if !leaks.is_empty() {
            self.diagnosis_leaks += 1;
            warn!(?leaks, "Patient reply contains forbidden terms");
        }

        self.history.push(ChatMessage::assistant(reply.clone()));
        self.exchanges += 1;
        info!(reply_chars = reply.chars().count(), "Patient replied");
        Ok(Command::PatientReply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockChatClient;
    use crate::message::Role;
    use crate::persona::sample_persona;
    use anyhow::anyhow;

    #[test]
    fn test_new_encounter_seeds_opening() {
        let encounter = Encounter::new(sample_persona(), "Chris");
        let opening = encounter.opening();
        assert_eq!(opening.len(), 2);
        assert_eq!(
            opening[0],
            ChatMessage::user("Hello Mr. Jones, my name is Chris, I am a medic here to help you.")
        );
        assert_eq!(
            opening[1],
            ChatMessage::assistant(
                "Hello, my name is Mr. Jones, and I do not know what is going on with me."
            )
        );
        assert_eq!(encounter.summary().exchanges, 0);
    }

    #[test]
    fn test_request_order_is_framing_history_reminders() {
        let encounter = Encounter::new(sample_persona(), "Chris");
        let messages = encounter.request_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(messages[3].content.starts_with("As a reminder"));
    }

    #[test]
    fn test_is_farewell() {
        assert!(is_farewell("bye"));
        assert!(is_farewell("  Bye \n"));
        assert!(!is_farewell("goodbye"));
        assert!(!is_farewell(""));
    }

    #[tokio::test]
    async fn test_respond_records_exchange() {
        let mut client = MockChatClient::new();
        client
            .expect_complete()
            .times(1)
            .withf(|messages| {
                messages.len() == 5
                    && messages[3] == ChatMessage::user("Where does it hurt?")
                    && messages[4].content.starts_with("As a reminder")
            })
            .returning(|_| Ok("Down on the right side of my belly.".to_string()));

        let mut encounter = Encounter::new(sample_persona(), "Chris");
        let command = encounter
            .respond(&client, "  Where does it hurt?  ")
            .await
            .unwrap();

        assert!(matches!(
            command,
            Command::PatientReply(ref reply) if reply == "Down on the right side of my belly."
        ));
        assert_eq!(encounter.history().len(), 4);
        assert_eq!(encounter.history()[3].role, Role::Assistant);
        // Reminders are sent but never stored.
        assert!(
            encounter
                .history()
                .iter()
                .all(|m| !m.content.starts_with("As a reminder"))
        );
        assert_eq!(encounter.summary().exchanges, 1);
    }

    #[tokio::test]
    async fn test_farewell_does_not_call_client() {
        let mut client = MockChatClient::new();
        client.expect_complete().times(0);

        let mut encounter = Encounter::new(sample_persona(), "Chris");
        let command = encounter.respond(&client, "bye").await.unwrap();

        match command {
            Command::EncounterComplete(summary) => {
                assert_eq!(summary.persona_id, "abdominal-pain-uncomplicated");
                assert_eq!(summary.exchanges, 0);
            }
            other => panic!("Expected EncounterComplete, got {other:?}"),
        }
        assert_eq!(encounter.history().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_call_leaves_history_unchanged() {
        let mut client = MockChatClient::new();
        client
            .expect_complete()
            .times(1)
            .returning(|_| Err(anyhow!("rate limited")));

        let mut encounter = Encounter::new(sample_persona(), "Chris");
        let err = encounter.respond(&client, "Any fever?").await.unwrap_err();

        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(encounter.history().len(), 2);
        assert_eq!(encounter.summary().exchanges, 0);
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let mut client = MockChatClient::new();
        client.expect_complete().times(0);

        let mut encounter = Encounter::new(sample_persona(), "Chris");
        assert!(encounter.respond(&client, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_leaked_diagnosis_is_counted() {
        let mut client = MockChatClient::new();
        let mut replies = vec![
            "I read online it could be appendicitis.".to_string(),
            "It started near my belly button.".to_string(),
        ]
        .into_iter();
        client
            .expect_complete()
            .times(2)
            .returning(move |_| Ok(replies.next().unwrap_or_default()));

        let mut encounter = Encounter::new(sample_persona(), "Chris");
        encounter.respond(&client, "What do you think it is?").await.unwrap();
        encounter.respond(&client, "Where did it start?").await.unwrap();

        let summary = encounter.summary();
        assert_eq!(summary.exchanges, 2);
        assert_eq!(summary.diagnosis_leaks, 1);
    }
}
