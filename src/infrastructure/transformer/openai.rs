use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{DomainError, StrategyConfig, TransformInput, TransformOutput, Transformer};
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const PROVIDER: &str = "openai";

/// Transformer backed by an OpenAI-compatible chat completions endpoint
#[derive(Debug)]
pub struct OpenAiCompatibleTransformer<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
    id: String,
    version: String,
}

impl<C: HttpClientTrait> OpenAiCompatibleTransformer<C> {
    pub fn new(client: C, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();

        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            id: format!("{}:{}", PROVIDER, model),
            version: "1".to_string(),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Identity used in cache keys
    pub fn with_identity(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.id = id.into();
        self.version = version.into();
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, input: &TransformInput) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": instructions(&input.strategy)},
                {"role": "user", "content": input.content},
            ],
            "temperature": input.temperature,
            "seed": input.seed,
            "stream": false,
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<TransformOutput, DomainError> {
        let response: ChatResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::transformer(&self.id, format!("Failed to parse response: {}", e))
        })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DomainError::transformer(&self.id, "No content in response"))?;

        Ok(TransformOutput::new(text))
    }
}

/// System prompt describing how far the rewrite may go
fn instructions(strategy: &StrategyConfig) -> String {
    format!(
        "Rewrite the user's document more concisely. Remove at most {}% of its length. \
         Keep every identifier, heading, numbered step, threshold, number with its unit \
         and MUST/SHOULD requirement exactly as written. Keep conditional logic intact. \
         Return only the rewritten document.",
        strategy.max_reduction_pct
    )
}

#[async_trait]
impl<C: HttpClientTrait> Transformer for OpenAiCompatibleTransformer<C> {
    async fn transform(&self, input: &TransformInput) -> Result<TransformOutput, DomainError> {
        let url = self.chat_completions_url();
        let body = self.build_request(input);

        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(|e| match e {
                DomainError::Transformer { message, .. } => {
                    DomainError::transformer(&self.id, message)
                }
                DomainError::Rejected { message, .. } => DomainError::rejected(&self.id, message),
                other => other,
            })?;

        self.parse_response(response)
    }

    fn transformer_id(&self) -> &str {
        &self.id
    }

    fn transformer_version(&self) -> &str {
        &self.version
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
