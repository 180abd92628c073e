use crate::OracleError;
use crate::oracle::{Oracle, OracleMessage};
use std::sync::{Arc, Mutex};

/// Replies with queued texts in order and records every prompt it receives.
/// Once the queue is empty every call fails.
pub(crate) struct ScriptedOracle {
    replies: Mutex<Vec<Result<String, OracleError>>>,
    pub(crate) seen: Arc<Mutex<Vec<Vec<OracleMessage>>>>,
}

impl ScriptedOracle {
    pub(crate) fn new(replies: &[&str]) -> Self {
        Self::queued(replies.iter().rev().map(|r| Ok(r.to_string())).collect())
    }

    /// Fails its first call with a network error.
    pub(crate) fn failing(message: &str) -> Self {
        Self::queued(vec![Err(OracleError::Network(message.to_string()))])
    }

    fn queued(replies: Vec<Result<String, OracleError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Oracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete(&self, messages: &[OracleMessage]) -> Result<String, OracleError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(OracleError::Failed("no reply queued".into())))
    }
}
