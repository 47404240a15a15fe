//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the conversational LLM. It implements
//! the `ChatModelService` port from the `core` crate over the OpenAI
//! chat-completion streaming API.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;

use edem_core::domain::{MessageRole, PromptMessage};
use edem_core::ports::{ChatModelService, GenerationParams, PortError, PortResult, ReplyStream};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn to_request_message(message: &PromptMessage) -> Result<ChatCompletionRequestMessage, PortError> {
    let built = match message.role {
        MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map(ChatCompletionRequestMessage::User),
        MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map(ChatCompletionRequestMessage::Assistant),
    };
    built.map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// `ChatModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatModelService for OpenAiChatAdapter {
    /// Streams a completion for the composed prompt, yielding incremental
    /// text fragments in arrival order. Dropping the returned stream cancels
    /// the upstream request.
    async fn stream_reply(
        &self,
        system_prompt: &str,
        messages: &[PromptMessage],
        params: GenerationParams,
    ) -> PortResult<ReplyStream> {
        let mut request_messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(messages.len() + 1);
        request_messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map(ChatCompletionRequestMessage::System)
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        );
        for message in messages {
            request_messages.push(to_request_message(message)?);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .temperature(params.temperature)
            .max_completion_tokens(params.max_output_tokens)
            .stream(true)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let fragments = upstream.map(|item| match item {
            Ok(response) => Ok(response
                .choices
                .first()
                .and_then(|choice| choice.delta.content.clone())
                .unwrap_or_default()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        });

        Ok(Box::pin(fragments))
    }
}
