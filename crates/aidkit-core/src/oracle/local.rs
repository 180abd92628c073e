use crate::OracleError;
use crate::http::default_agent;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Oracle, OracleMessage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama `/api/chat` provider, non-streaming.
pub struct OllamaProvider {
    model: String,
    base_url: String,
    agent: ureq::Agent,
}

impl OllamaProvider {
    pub fn new(model: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var("OLLAMA_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: default_agent(),
        }
    }

    fn parse_response(body: &str) -> Result<String, OracleError> {
        let response: OllamaChatResponse = serde_json::from_str(body)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(OracleError::Failed(error));
        }
        response
            .message
            .map(|message| message.content)
            .ok_or_else(|| OracleError::InvalidResponse("no message".into()))
    }
}

impl Oracle for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn complete(&self, messages: &[OracleMessage]) -> Result<String, OracleError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        debug!(model = %self.model, messages = messages.len(), "oracle request");

        let raw = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| OracleError::Network(format!("{e}")))?
            .into_body()
            .read_to_string()
            .map_err(|e| OracleError::Network(format!("{e}")))?;

        Self::parse_response(raw.trim())
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}
