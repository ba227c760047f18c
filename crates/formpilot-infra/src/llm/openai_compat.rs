//! OpenAI-compatible LLM provider.
//!
//! One provider serves any endpoint speaking the OpenAI Chat Completions
//! protocol -- a hosted platform, Ollama, vLLM, or a self-hosted gateway
//! -- via a configurable base URL. Uses [`async_openai`] for type-safe
//! request/response handling; the call-level timeout wraps each request,
//! and retries deliberately do not live here (the output guards own them).

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_openai::Client;
use secrecy::{ExposeSecret, SecretString};

use formpilot_core::llm::LlmProvider;
use formpilot_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, Usage,
};

/// Provider for any OpenAI-compatible chat-completions API.
///
/// Does NOT derive Debug to prevent accidental exposure of the API key
/// stored inside the `async_openai::Client`.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Create a provider against the given endpoint.
    ///
    /// The endpoint may be the full chat-completions URL; a trailing
    /// `/chat/completions` or `/completions` is stripped because the
    /// client appends it.
    pub fn new(endpoint: &str, api_key: SecretString, timeout: Duration) -> Self {
        let base_url = normalize_base_url(endpoint);
        let config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(base_url);

        Self {
            client: Client::with_config(config),
            timeout,
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(system) = &request.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(system.clone()),
                    name: None,
                },
            ));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                MessageRole::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage {
                        content: ChatCompletionRequestSystemMessageContent::Text(
                            msg.content.clone(),
                        ),
                        name: None,
                    },
                ),
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            };
            messages.push(oai_msg);
        }

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request);

        let response = tokio::time::timeout(
            self.timeout,
            self.client.chat().create(oai_request),
        )
        .await
        .map_err(|_| LlmError::Timeout {
            seconds: self.timeout.as_secs(),
        })?
        .map_err(map_error)?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(LlmError::EmptyCompletion)?;

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: response.model,
            usage,
        })
    }
}

/// Strip a trailing `/chat/completions` or `/completions` path segment.
fn normalize_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    for suffix in ["/chat/completions", "/completions"] {
        if let Some(base) = trimmed.strip_suffix(suffix) {
            return base.to_string();
        }
    }
    trimmed.to_string()
}

fn map_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || error_type == "authentication_error"
                || api_err.message.contains("Invalid API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => {
            if reqwest_err.status().is_some_and(|s| s.as_u16() == 401) {
                LlmError::AuthenticationFailed
            } else if reqwest_err.status().is_some_and(|s| s.as_u16() == 429) {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_strips_suffixes() {
        assert_eq!(
            normalize_base_url("http://llm.internal/v1/chat/completions"),
            "http://llm.internal/v1"
        );
        assert_eq!(
            normalize_base_url("http://llm.internal/v1/completions/"),
            "http://llm.internal/v1"
        );
        assert_eq!(normalize_base_url("http://llm.internal/v1"), "http://llm.internal/v1");
    }

    #[test]
    fn test_build_request_shapes_messages() {
        use formpilot_types::llm::Message;

        let provider = OpenAiCompatibleProvider::new(
            "http://llm.internal/v1",
            SecretString::from("test-key".to_string()),
            Duration::from_secs(300),
        );
        let request = CompletionRequest::new(
            "default",
            "system prompt".to_string(),
            vec![Message::user("hi"), Message::assistant("hello"), Message::user("ask me")],
        );
        let oai = provider.build_request(&request);

        assert_eq!(oai.model, "default");
        // system + 3 conversation messages
        assert_eq!(oai.messages.len(), 4);
        assert_eq!(oai.max_completion_tokens, Some(1024));
        assert_eq!(oai.temperature, Some(0.0));
    }
}
