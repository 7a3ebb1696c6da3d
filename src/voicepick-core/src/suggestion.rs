//! Dialogue suggestions from a text-generation service.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SuggestionConfig;
use crate::error::PickerError;
use crate::model::Character;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub character_name: String,
    pub character_description: String,
}

impl From<&Character> for SuggestionRequest {
    fn from(character: &Character) -> Self {
        Self {
            character_name: character.name.clone(),
            character_description: character.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggested_text: String,
}

/// One request, one response. No retries.
#[async_trait]
pub trait SuggestionGateway: Send + Sync {
    async fn suggest(&self, request: SuggestionRequest) -> Result<SuggestionResponse, PickerError>;
}

/// Gateway backed by an OpenAI-compatible chat completion endpoint.
pub struct OpenAiSuggestionGateway {
    client: Client<OpenAIConfig>,
    config: SuggestionConfig,
}

impl OpenAiSuggestionGateway {
    pub fn new(
        api_base: &str,
        api_key: &str,
        config: SuggestionConfig,
    ) -> Result<Self, PickerError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| {
                PickerError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            config,
        })
    }
}

#[async_trait]
impl SuggestionGateway for OpenAiSuggestionGateway {
    async fn suggest(&self, request: SuggestionRequest) -> Result<SuggestionResponse, PickerError> {
        let prompt = self
            .config
            .prompt(&request.character_name, &request.character_description);

        let completion = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .max_completion_tokens(self.config.max_tokens)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.into(),
                    name: None,
                },
            )])
            .build()?;

        tracing::debug!(model = %self.config.model, character = %request.character_name, "Requesting suggestion");

        let response = self
            .client
            .chat()
            .create(completion)
            .await
            .map_err(|e| PickerError::Gateway(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let suggested_text = sanitize_suggestion(&content);
        if suggested_text.is_empty() {
            return Err(PickerError::Gateway("empty suggestion".to_string()));
        }
        Ok(SuggestionResponse { suggested_text })
    }
}

/// Clean a generated line: drop reasoning tags, markdown emphasis, a
/// "Phrase :" prefix and wrapping quotes, then collapse whitespace.
pub fn sanitize_suggestion(response: &str) -> String {
    let tags_to_strip = ["thinking", "think", "reasoning", "reflection", "analysis"];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    if let Ok(prefix_re) = regex::Regex::new(r"(?i)^\s*phrase\s*:\s*") {
        result = prefix_re.replace(&result, "").to_string();
    }

    let mut text = result.trim();
    for (open, close) in [("\"", "\""), ("«", "»"), ("“", "”"), ("'", "'")] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|t| t.strip_suffix(close))
        {
            text = inner.trim();
        }
    }
    text.to_string()
}
