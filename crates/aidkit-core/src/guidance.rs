//! Voice-driven guidance through a sequence of spoken steps.
//!
//! ```text
//!   Idle --start--> Listening --transcript--> (oracle) --> Speaking
//!   Speaking --finish--> Listening            (conversation reply)
//!   Speaking --finish--> AwaitingCommand      (steps delivered / command answered)
//!   AwaitingCommand --next|back|repeat--> Speaking
//!   AwaitingCommand --anything else--> (oracle) --> Speaking
//!   any --end--> Idle
//! ```
//!
//! One session holds one step sequence; callers that serve several users
//! need one `GuidanceSession` each.

use crate::RequestError;
use crate::prompt::follow_up;
use crate::voice::{GuidanceMode, VoiceReply, VoiceRequest, VoiceService};
use tracing::debug;

pub const LAST_STEP_MESSAGE: &str = "This Is The Last Step.";
pub const FIRST_STEP_MESSAGE: &str = "This Is The First Step.";
pub const NO_STEPS_MESSAGE: &str = "There Are No Steps To Guide.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Listening,
    Speaking,
    /// Listening for navigation commands after a step sequence was delivered.
    AwaitingCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Next,
    Back,
    Repeat,
    Unrecognized,
}

/// Map a spoken transcript to a navigation command.
///
/// Whitespace is removed and case folded before substring matching, so
/// "please go NEXT" and "nextstep" are both `Next`.
pub fn interpret(transcript: &str) -> VoiceCommand {
    let cleaned: String = transcript
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if cleaned.contains("next") {
        VoiceCommand::Next
    } else if cleaned.contains("back") || cleaned.contains("previous") {
        VoiceCommand::Back
    } else if cleaned.contains("again") || cleaned.contains("repeat") {
        VoiceCommand::Repeat
    } else {
        VoiceCommand::Unrecognized
    }
}

/// Ordered steps and a cursor into them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSequence {
    steps: Vec<String>,
    index: usize,
}

impl StepSequence {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps, index: 0 }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        self.steps.get(self.index).map(String::as_str)
    }

    pub fn is_last(&self) -> bool {
        !self.steps.is_empty() && self.index == self.steps.len() - 1
    }

    /// Move forward one step; false when already on the last one.
    pub fn advance(&mut self) -> bool {
        if self.index + 1 < self.steps.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Move back one step; false when already on the first one.
    pub fn retreat(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// The closing step, when it is a question awaiting the user's answer.
    pub fn pending_question(&self) -> Option<&str> {
        if !self.is_last() {
            return None;
        }
        self.current().filter(|step| step.trim_end().ends_with('?'))
    }

    /// Text to speak for a navigation command; the cursor moves as needed.
    pub fn navigate(&mut self, command: VoiceCommand) -> String {
        if self.steps.is_empty() {
            return NO_STEPS_MESSAGE.to_string();
        }
        let moved = match command {
            VoiceCommand::Next => self.advance(),
            VoiceCommand::Back => self.retreat(),
            VoiceCommand::Repeat | VoiceCommand::Unrecognized => true,
        };
        match (moved, command) {
            (false, VoiceCommand::Next) => LAST_STEP_MESSAGE.to_string(),
            (false, _) => FIRST_STEP_MESSAGE.to_string(),
            (true, _) => self.current().unwrap_or_default().to_string(),
        }
    }
}

/// Next move for a transcript: answer locally, or ask the voice endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Speak(String),
    Submit {
        request: VoiceRequest,
        /// Resume command mode once the reply has been spoken.
        return_to_steps: bool,
    },
}

/// Explicit state machine behind a hands-free guidance conversation.
#[derive(Debug, Clone)]
pub struct GuidanceSession {
    state: VoiceState,
    resume: VoiceState,
    steps: StepSequence,
    initial_mode: GuidanceMode,
    ask_steps: bool,
}

impl GuidanceSession {
    /// `initial_mode` decides how transcripts outside command mode are sent;
    /// `ask_steps` makes conversation replies offer step-by-step guidance.
    pub fn new(initial_mode: GuidanceMode, ask_steps: bool) -> Self {
        Self {
            state: VoiceState::Idle,
            resume: VoiceState::Listening,
            steps: StepSequence::default(),
            initial_mode,
            ask_steps,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    pub fn in_command_mode(&self) -> bool {
        self.state == VoiceState::AwaitingCommand
            || (self.state == VoiceState::Speaking && self.resume == VoiceState::AwaitingCommand)
    }

    pub fn start(&mut self) {
        self.steps = StepSequence::default();
        self.state = VoiceState::Listening;
        self.resume = VoiceState::Listening;
    }

    pub fn end(&mut self) {
        self.steps = StepSequence::default();
        self.state = VoiceState::Idle;
        self.resume = VoiceState::Listening;
    }

    /// Speech output finished; go back to listening.
    pub fn finish_speaking(&mut self) {
        if self.state == VoiceState::Speaking {
            self.state = self.resume;
        }
    }

    fn speak_then(&mut self, resume: VoiceState) {
        self.state = VoiceState::Speaking;
        self.resume = resume;
    }

    /// Decide what a transcript means in the current state.
    ///
    /// Navigation commands are answered here and logged through `voice`;
    /// everything else comes back as a request to submit.
    pub fn dispatch(&mut self, transcript: &str, voice: &VoiceService) -> Dispatch {
        match self.state {
            VoiceState::Idle => self.start(),
            // Talking over the assistant cuts the speech short.
            VoiceState::Speaking => self.finish_speaking(),
            VoiceState::Listening | VoiceState::AwaitingCommand => {}
        }

        if self.state != VoiceState::AwaitingCommand {
            let request = match self.initial_mode {
                GuidanceMode::Conversation => {
                    VoiceRequest::conversation(transcript, self.ask_steps)
                }
                GuidanceMode::Steps => VoiceRequest::steps(transcript),
            };
            return Dispatch::Submit {
                request,
                return_to_steps: false,
            };
        }

        let command = interpret(transcript);
        debug!(?command, step = self.steps.index(), "voice command");

        if command == VoiceCommand::Unrecognized {
            if let Some(question) = self.steps.pending_question() {
                return Dispatch::Submit {
                    request: VoiceRequest::steps(follow_up(question, transcript)),
                    return_to_steps: false,
                };
            }
            return Dispatch::Submit {
                request: VoiceRequest::conversation(transcript, false),
                return_to_steps: true,
            };
        }

        let response = self.steps.navigate(command);
        voice.record_command(transcript, &response);
        self.speak_then(VoiceState::AwaitingCommand);
        Dispatch::Speak(response)
    }

    /// Take in an endpoint reply and return the text to speak.
    pub fn apply(&mut self, reply: &VoiceReply, return_to_steps: bool) -> String {
        if let Some(steps) = &reply.assistant_steps {
            let steps = if steps.is_empty() {
                vec![reply.assistant_text.clone()]
            } else {
                steps.clone()
            };
            self.steps = StepSequence::new(steps);
            self.speak_then(VoiceState::AwaitingCommand);
            return self.steps.current().unwrap_or_default().to_string();
        }

        if return_to_steps {
            self.speak_then(VoiceState::AwaitingCommand);
        } else {
            self.steps = StepSequence::default();
            self.speak_then(VoiceState::Listening);
        }
        reply.assistant_text.clone()
    }

    /// Handle one transcript end to end and return what should be spoken.
    ///
    /// On error the session stays where it was.
    pub fn respond(&mut self, transcript: &str, voice: &VoiceService) -> Result<String, RequestError> {
        match self.dispatch(transcript, voice) {
            Dispatch::Speak(text) => Ok(text),
            Dispatch::Submit {
                request,
                return_to_steps,
            } => {
                let reply = voice.submit(&request)?;
                Ok(self.apply(&reply, return_to_steps))
            }
        }
    }

    /// Ask for steps for the most recent user message without new input.
    pub fn request_steps(&mut self, voice: &VoiceService) -> Result<String, RequestError> {
        if self.state == VoiceState::Idle {
            self.start();
        }
        self.finish_speaking();
        let reply = voice.submit(&VoiceRequest::steps(""))?;
        Ok(self.apply(&reply, false))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Dispatch, FIRST_STEP_MESSAGE, GuidanceSession, LAST_STEP_MESSAGE, NO_STEPS_MESSAGE,
        StepSequence, VoiceCommand, VoiceState, interpret,
    };
    use crate::oracle::OracleMessage;
    use crate::testing::ScriptedOracle;
    use crate::types::Role;
    use crate::voice::{GuidanceMode, VoiceService};
    use std::sync::{Arc, Mutex};

    fn steps(items: &[&str]) -> StepSequence {
        StepSequence::new(items.iter().map(|item| item.to_string()).collect())
    }

    type Seen = Arc<Mutex<Vec<Vec<OracleMessage>>>>;

    fn service(replies: &[&str]) -> (VoiceService, Seen) {
        let oracle = ScriptedOracle::new(replies);
        let seen = oracle.seen.clone();
        (VoiceService::new(Some(Box::new(oracle))), seen)
    }

    /// Session already in command mode over `A, B, C`.
    fn guiding(replies: &[&str]) -> (GuidanceSession, VoiceService, Seen) {
        let mut queued = vec!["A\nB\nC"];
        queued.extend_from_slice(replies);
        let (voice, seen) = service(&queued);
        let mut session = GuidanceSession::new(GuidanceMode::Steps, false);
        session.start();
        let spoken = session.respond("my friend fainted", &voice).unwrap();
        assert_eq!(spoken, "A");
        session.finish_speaking();
        assert_eq!(session.state(), VoiceState::AwaitingCommand);
        (session, voice, seen)
    }

    #[test]
    fn interpret_matches_substrings_in_priority_order() {
        assert_eq!(interpret("please go next"), VoiceCommand::Next);
        assert_eq!(interpret("N E X T"), VoiceCommand::Next);
        assert_eq!(interpret("go back, next"), VoiceCommand::Next);
        assert_eq!(interpret("previous one"), VoiceCommand::Back);
        assert_eq!(interpret("Go Back"), VoiceCommand::Back);
        assert_eq!(interpret("say that again"), VoiceCommand::Repeat);
        assert_eq!(interpret("repeat"), VoiceCommand::Repeat);
        assert_eq!(interpret("he is breathing"), VoiceCommand::Unrecognized);
    }

    #[test]
    fn navigate_moves_within_bounds() {
        let mut sequence = steps(&["A", "B", "C"]);
        assert_eq!(sequence.navigate(VoiceCommand::Back), FIRST_STEP_MESSAGE);
        assert_eq!(sequence.index(), 0);
        assert_eq!(sequence.navigate(VoiceCommand::Next), "B");
        assert_eq!(sequence.navigate(VoiceCommand::Next), "C");
        assert_eq!(sequence.navigate(VoiceCommand::Next), LAST_STEP_MESSAGE);
        assert_eq!(sequence.index(), 2);
        assert_eq!(sequence.navigate(VoiceCommand::Repeat), "C");
        assert_eq!(sequence.navigate(VoiceCommand::Back), "B");
        assert_eq!(sequence.index(), 1);
    }

    #[test]
    fn navigate_without_steps_says_so() {
        let mut sequence = StepSequence::default();
        for command in [VoiceCommand::Next, VoiceCommand::Back, VoiceCommand::Repeat] {
            assert_eq!(sequence.navigate(command), NO_STEPS_MESSAGE);
        }
    }

    #[test]
    fn pending_question_only_on_last_step() {
        let mut sequence = steps(&["Is he awake?", "Check breathing.", "Is he bleeding? "]);
        assert_eq!(sequence.pending_question(), None);
        sequence.advance();
        sequence.advance();
        assert_eq!(sequence.pending_question(), Some("Is he bleeding? "));
    }

    #[test]
    fn next_advances_and_stops_at_last_step() {
        let (mut session, voice, _seen) = guiding(&[]);

        let spoken = session.respond("please go next", &voice).unwrap();
        assert_eq!(spoken, "B");
        assert_eq!(session.steps().index(), 1);
        assert_eq!(session.state(), VoiceState::Speaking);
        session.finish_speaking();

        session.respond("next", &voice).unwrap();
        session.finish_speaking();
        assert_eq!(session.steps().index(), 2);
        let spoken = session.respond("next", &voice).unwrap();
        assert_eq!(spoken, LAST_STEP_MESSAGE);
        assert_eq!(session.steps().index(), 2);
    }

    #[test]
    fn commands_are_logged_as_pairs() {
        let (mut session, voice, _seen) = guiding(&[]);
        session.respond("back", &voice).unwrap();
        let messages = voice.list().messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].text, "back");
        assert_eq!(messages[3].role, Role::Assistant);
        assert_eq!(messages[3].text, FIRST_STEP_MESSAGE);
        assert_eq!(messages[3].created_at, messages[2].created_at + 1);
    }

    #[test]
    fn answer_to_closing_question_is_a_follow_up() {
        let (voice, seen) = service(&["Lay her down.\nIs she breathing?", "Start CPR.\nCall for help."]);
        let mut session = GuidanceSession::new(GuidanceMode::Steps, false);
        session.start();
        session.respond("my mother collapsed", &voice).unwrap();
        session.finish_speaking();
        assert_eq!(session.respond("next", &voice).unwrap(), "Is she breathing?");
        session.finish_speaking();

        let spoken = session.respond("no she is not", &voice).unwrap();
        assert_eq!(spoken, "Start CPR.");
        assert_eq!(session.steps().index(), 0);
        assert_eq!(session.steps().steps().len(), 2);
        session.finish_speaking();
        assert!(session.in_command_mode());

        let calls = seen.lock().unwrap();
        assert_eq!(
            calls[1].last().unwrap().content,
            "Follow-up to: \"Is she breathing?\" User answer: no she is not"
        );
    }

    #[test]
    fn other_speech_becomes_conversation_then_returns_to_steps() {
        let (mut session, voice, seen) = guiding(&["Yes, that is normal."]);
        let spoken = session.respond("is it ok that he is sweating", &voice).unwrap();
        assert_eq!(spoken, "Yes, that is normal.");
        session.finish_speaking();
        assert_eq!(session.state(), VoiceState::AwaitingCommand);
        assert_eq!(session.steps().steps().len(), 3);
        assert_eq!(session.respond("next", &voice).unwrap(), "B");

        let calls = seen.lock().unwrap();
        let conversation = &calls[1];
        assert_eq!(conversation.last().unwrap().content, "is it ok that he is sweating");
        assert!(conversation.len() > 2);
    }

    #[test]
    fn conversation_reply_returns_to_listening() {
        let (voice, _seen) = service(&["Stay with them. If you need step-by-step guidance, say so."]);
        let mut session = GuidanceSession::new(GuidanceMode::Conversation, true);
        session.start();
        session.respond("someone fell", &voice).unwrap();
        assert!(!session.in_command_mode());
        session.finish_speaking();
        assert_eq!(session.state(), VoiceState::Listening);
        assert!(session.steps().is_empty());
    }

    #[test]
    fn request_steps_reuses_last_user_message() {
        let (voice, seen) = service(&["Keep talking to me.", "Check the scene.\nCall for help."]);
        let mut session = GuidanceSession::new(GuidanceMode::Conversation, true);
        session.start();
        session.respond("car accident outside", &voice).unwrap();
        let spoken = session.request_steps(&voice).unwrap();
        assert_eq!(spoken, "Check the scene.");
        session.finish_speaking();
        assert_eq!(session.state(), VoiceState::AwaitingCommand);

        let calls = seen.lock().unwrap();
        assert_eq!(calls[1].last().unwrap().content, "car accident outside");
    }

    #[test]
    fn oracle_failure_keeps_state() {
        let (mut session, voice, _seen) = guiding(&[]);
        let err = session.respond("what about the dog", &voice).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(session.state(), VoiceState::AwaitingCommand);
        assert_eq!(session.steps().index(), 0);
    }

    #[test]
    fn end_returns_to_idle() {
        let (mut session, _voice, _seen) = guiding(&[]);
        session.end();
        assert_eq!(session.state(), VoiceState::Idle);
        assert!(session.steps().is_empty());
        assert!(matches!(
            GuidanceSession::new(GuidanceMode::Conversation, true).state(),
            VoiceState::Idle
        ));
    }

    #[test]
    fn transcript_while_idle_starts_listening() {
        let (voice, _seen) = service(&[]);
        let mut session = GuidanceSession::new(GuidanceMode::Conversation, true);
        let dispatch = session.dispatch("hello", &voice);
        assert!(matches!(dispatch, Dispatch::Submit { return_to_steps: false, .. }));
        assert_eq!(session.state(), VoiceState::Listening);
    }
}
