pub mod cloud;
pub mod local;

use crate::OracleError;
use crate::types::{ChatMessage, Role};
use serde::Serialize;

pub const DEFAULT_CLOUD_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleRole {
    System,
    User,
    Assistant,
}

impl From<Role> for OracleRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => OracleRole::User,
            Role::Assistant => OracleRole::Assistant,
        }
    }
}

/// One chat turn sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleMessage {
    pub role: OracleRole,
    pub content: String,
}

impl OracleMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: OracleRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: OracleRole::User,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for OracleMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.into(),
            content: message.content.clone(),
        }
    }
}

/// Hosted or local language model used as a prompt-to-text function.
pub trait Oracle: Send + Sync {
    fn name(&self) -> &'static str;
    fn complete(&self, messages: &[OracleMessage]) -> Result<String, OracleError>;
}

pub fn create_oracle(
    provider: &str,
    model: Option<&str>,
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> Result<Box<dyn Oracle>, OracleError> {
    match provider {
        "openai" => Ok(Box::new(cloud::OpenAiProvider::new(model, api_key, base_url)?)),
        "ollama" => Ok(Box::new(local::OllamaProvider::new(
            model.unwrap_or(DEFAULT_LOCAL_MODEL),
            base_url,
        ))),
        other => Err(OracleError::Failed(format!("unknown oracle provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{OracleMessage, OracleRole, create_oracle};
    use crate::types::{ChatMessage, Role};

    #[test]
    fn chat_history_maps_to_oracle_roles() {
        let chat = ChatMessage {
            id: "c1".to_string(),
            role: Role::Assistant,
            content: "Stay calm.".to_string(),
            created_at: 1,
        };
        let message = OracleMessage::from(&chat);
        assert_eq!(message.role, OracleRole::Assistant);
        assert_eq!(message.content, "Stay calm.");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn create_oracle_rejects_unknown_provider() {
        assert!(create_oracle("bogus", None, None, None).is_err());
    }

    #[test]
    fn create_oracle_requires_cloud_key() {
        assert!(create_oracle("openai", None, Some("  "), None).is_err());
        let oracle = create_oracle("openai", None, Some("sk-test"), None).unwrap();
        assert_eq!(oracle.name(), "openai");
        let oracle = create_oracle("ollama", None, None, None).unwrap();
        assert_eq!(oracle.name(), "ollama");
    }
}
