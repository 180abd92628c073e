use crate::RequestError;
use crate::lenient;
use crate::oracle::{Oracle, OracleMessage};
use crate::prep::Cleared;
use crate::prompt::{
    CONVERSATION_OFFER_STEPS_PROMPT, CONVERSATION_PROMPT, EMPTY_VOICE_REPLY, STEPS_PROMPT,
};
use crate::reply::split_steps;
use crate::store::{Exchange, VoiceStore};
use crate::types::VoiceMessage;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

/// Chat messages replayed to the oracle in conversation mode.
pub const DEFAULT_HISTORY_LIMIT: usize = 12;

/// How the oracle should answer a voice request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceMode {
    #[default]
    Conversation,
    Steps,
}

impl GuidanceMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "conversation" => Some(GuidanceMode::Conversation),
            "steps" => Some(GuidanceMode::Steps),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceRequest {
    #[serde(deserialize_with = "lenient::string")]
    pub text: String,
    /// Anything other than `"steps"` means conversation.
    #[serde(deserialize_with = "lenient_mode")]
    pub mode: GuidanceMode,
    /// Conversation mode only: offer step-by-step guidance. Absent means yes.
    #[serde(deserialize_with = "lenient::flag")]
    pub ask_steps: Option<bool>,
}

fn lenient_mode<'de, D>(deserializer: D) -> Result<GuidanceMode, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)?.as_str() {
        Some("steps") => GuidanceMode::Steps,
        _ => GuidanceMode::Conversation,
    })
}

impl VoiceRequest {
    pub fn conversation(text: impl Into<String>, ask_steps: bool) -> Self {
        Self {
            text: text.into(),
            mode: GuidanceMode::Conversation,
            ask_steps: Some(ask_steps),
        }
    }

    pub fn steps(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: GuidanceMode::Steps,
            ask_steps: Some(false),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceReply {
    pub user_message: VoiceMessage,
    pub assistant_message: VoiceMessage,
    pub messages: Vec<VoiceMessage>,
    pub assistant_text: String,
    pub assistant_steps: Option<Vec<String>>,
    pub mode: GuidanceMode,
    pub ask_steps: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceLog {
    pub messages: Vec<VoiceMessage>,
}

fn system_prompt(mode: GuidanceMode, ask_steps: bool) -> &'static str {
    match (mode, ask_steps) {
        (GuidanceMode::Steps, _) => STEPS_PROMPT,
        (GuidanceMode::Conversation, true) => CONVERSATION_OFFER_STEPS_PROMPT,
        (GuidanceMode::Conversation, false) => CONVERSATION_PROMPT,
    }
}

/// Voice guidance endpoint: list, converse or generate steps, clear.
pub struct VoiceService {
    oracle: Option<Box<dyn Oracle>>,
    store: VoiceStore,
    history_limit: usize,
}

impl VoiceService {
    pub fn new(oracle: Option<Box<dyn Oracle>>) -> Self {
        Self {
            oracle,
            store: VoiceStore::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn list(&self) -> VoiceLog {
        VoiceLog {
            messages: self.store.voice_messages(),
        }
    }

    /// Send a transcript to the oracle and log the exchange.
    ///
    /// Steps mode with no text reuses the last user message. Unlike the
    /// preparedness endpoint there is no offline fallback here.
    pub fn submit(&self, request: &VoiceRequest) -> Result<VoiceReply, RequestError> {
        let text = request.text.trim();
        let mode = request.mode;
        let ask_steps = request.ask_steps.unwrap_or(true);

        if text.is_empty() && mode != GuidanceMode::Steps {
            return Err(RequestError::Validation("text is required".into()));
        }
        let oracle = self.oracle.as_deref().ok_or_else(|| {
            RequestError::Configuration("OPENAI_API_KEY is not configured.".into())
        })?;

        let user_text = if text.is_empty() {
            self.store.last_user_message().ok_or_else(|| {
                RequestError::Validation("No prior user message to generate steps.".into())
            })?
        } else {
            text.to_string()
        };

        let history = match mode {
            GuidanceMode::Conversation => self.store.recent_chat(self.history_limit),
            GuidanceMode::Steps => Vec::new(),
        };
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OracleMessage::system(system_prompt(mode, ask_steps)));
        messages.extend(history.iter().map(OracleMessage::from));
        messages.push(OracleMessage::user(user_text.as_str()));
        debug!(?mode, history = history.len(), "voice request");

        let raw = oracle.complete(&messages)?;
        let full_text = match raw.trim() {
            "" => EMPTY_VOICE_REPLY.to_string(),
            text => text.to_string(),
        };

        let assistant_steps = match mode {
            GuidanceMode::Steps => Some(split_steps(&full_text)),
            GuidanceMode::Conversation => None,
        };
        let assistant_text = assistant_steps
            .as_ref()
            .and_then(|steps| steps.first().cloned())
            .unwrap_or(full_text);

        let Exchange {
            user_message,
            assistant_message,
        } = self.store.add_exchange(&user_text, &assistant_text);
        info!(?mode, steps = assistant_steps.as_ref().map_or(0, Vec::len), "voice exchange logged");

        Ok(VoiceReply {
            user_message,
            assistant_message,
            messages: self.store.voice_messages(),
            assistant_text,
            assistant_steps,
            mode,
            ask_steps: mode == GuidanceMode::Conversation && ask_steps,
        })
    }

    /// Log a navigation command and its spoken response (voice log only).
    pub fn record_command(&self, transcript: &str, response: &str) -> Exchange {
        self.store.record_command(transcript, response)
    }

    pub fn clear(&self) -> Cleared {
        self.store.clear();
        Cleared { ok: true }
    }
}
