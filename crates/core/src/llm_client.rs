use crate::message::{ChatMessage, Role};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use tracing::debug;

/// A generic client for a chat-completion model.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the full conversation and returns the model's next message.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;
}

/// An implementation of `ChatClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and organization.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-3.5-turbo-1106").
    /// * `temperature` - Sampling temperature; `0` keeps the patient's answers repeatable.
    pub fn new(config: OpenAIConfig, model: String, temperature: f32) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Converts provider-agnostic messages into the request types of `async-openai`.
pub fn to_request_messages(
    messages: &[ChatMessage],
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    messages
        .iter()
        .map(|msg| {
            Ok(match msg.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            })
        })
        .collect()
}

#[async_trait]
impl ChatClient for OpenAICompatibleClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(&messages)?)
            .temperature(self.temperature)
            .build()?;

        debug!(model = %self.model, messages = messages.len(), "Sending chat completion request");
        let response: CreateChatCompletionResponse = self
            .client
            .chat()
            .create(request)
            .await
            .context("Chat completion request failed")?;

        debug!(
            total_tokens = ?response.usage.as_ref().map(|u| u.total_tokens),
            "Chat completion received"
        );

        response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_request_messages_keeps_order_and_roles() {
        let messages = vec![
            ChatMessage::system("frame"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ];
        let converted = to_request_messages(&messages).unwrap();
        assert_eq!(converted.len(), 3);
        assert!(matches!(converted[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(converted[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(converted[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn test_client_keeps_model() {
        let client = OpenAICompatibleClient::new(
            OpenAIConfig::new().with_api_key("sk-test"),
            "gpt-3.5-turbo-1106".to_string(),
            0.0,
        );
        assert_eq!(client.model(), "gpt-3.5-turbo-1106");
    }
}
