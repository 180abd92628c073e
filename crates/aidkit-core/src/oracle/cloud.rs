use crate::OracleError;
use crate::http::default_agent;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{DEFAULT_CLOUD_MODEL, Oracle, OracleMessage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible `/chat/completions` provider.
pub struct OpenAiProvider {
    model: String,
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl OpenAiProvider {
    pub fn new(
        model: Option<&str>,
        api_key: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<Self, OracleError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| OracleError::Failed("cloud API key not set".into()))?
            .to_string();
        let base_url = base_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Ok(Self {
            model: model.unwrap_or(DEFAULT_CLOUD_MODEL).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            agent: default_agent(),
        })
    }

    fn build_request_body(&self, messages: &[OracleMessage]) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": messages,
        })
    }

    fn parse_response(body: &str) -> Result<String, OracleError> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::InvalidResponse("no choices".into()))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

impl Oracle for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn complete(&self, messages: &[OracleMessage]) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(messages);
        debug!(model = %self.model, messages = messages.len(), "oracle request");

        let response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| OracleError::Network(format!("{e}")))?;

        let raw = response
            .into_body()
            .read_to_string()
            .map_err(|e| OracleError::Network(format!("{e}")))?;

        Self::parse_response(raw.trim())
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
