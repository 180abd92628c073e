use aidkit_core::guidance::{GuidanceSession, VoiceState};
use aidkit_core::types::Role;
use aidkit_core::voice::VoiceService;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

const HELP: &str = "Describe the situation. In step mode say next, back or repeat.\n/steps  step-by-step guidance for your last message\n/log    show the conversation log\n/clear  forget the conversation\n/end    end the session\n/quit   exit";

/// Line-oriented stand-in for a microphone and speaker.
///
/// Each input line is a transcript; each printed reply counts as fully spoken.
pub fn run<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    session: &mut GuidanceSession,
    voice: &VoiceService,
) -> io::Result<()> {
    writeln!(out, "{HELP}")?;
    session.start();
    prompt(out, session)?;

    for line in input.lines() {
        let line = line?;
        let transcript = line.trim();
        match transcript {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => writeln!(out, "{HELP}")?,
            "/end" => {
                session.end();
                writeln!(out, "session ended; type to start again")?;
            }
            "/clear" => {
                voice.clear();
                session.start();
                writeln!(out, "conversation cleared")?;
            }
            "/log" => print_log(out, voice)?,
            "/steps" => {
                let result = session.request_steps(voice);
                speak(out, session, result)?;
            }
            _ => {
                let result = session.respond(transcript, voice);
                speak(out, session, result)?;
            }
        }
        prompt(out, session)?;
    }

    session.end();
    Ok(())
}

fn speak<W: Write>(
    out: &mut W,
    session: &mut GuidanceSession,
    result: Result<String, aidkit_core::RequestError>,
) -> io::Result<()> {
    match result {
        Ok(text) => {
            writeln!(out, "{}", render(session, &text))?;
            session.finish_speaking();
            debug!(state = ?session.state(), "spoken");
        }
        Err(err) => {
            warn!(status = err.status(), error = %err, "voice request failed");
            writeln!(out, "error: {err}")?;
        }
    }
    Ok(())
}

fn render(session: &GuidanceSession, text: &str) -> String {
    let steps = session.steps();
    if session.in_command_mode() && steps.current() == Some(text) {
        format!("[{}/{}] {text}", steps.index() + 1, steps.steps().len())
    } else {
        text.to_string()
    }
}

fn prompt<W: Write>(out: &mut W, session: &GuidanceSession) -> io::Result<()> {
    let marker = match session.state() {
        VoiceState::AwaitingCommand => "step> ",
        VoiceState::Idle => "idle> ",
        VoiceState::Listening | VoiceState::Speaking => "> ",
    };
    write!(out, "{marker}")?;
    out.flush()
}

fn print_log<W: Write>(out: &mut W, voice: &VoiceService) -> io::Result<()> {
    let messages = voice.list().messages;
    if messages.is_empty() {
        return writeln!(out, "(no messages)");
    }
    for message in messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "aid",
        };
        writeln!(out, "{who}: {}", message.text)?;
    }
    Ok(())
}
