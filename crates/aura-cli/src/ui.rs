//! Terminal rendering and command parsing.

use aura_core::{Credentials, SessionError, SessionState, SessionView};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Enroll,
    Reenroll,
    Forget,
    Capture,
    Cancel,
    Login {
        identifier: String,
        pass_phrase: String,
    },
    SignOut,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse a line. While enrolling, an empty line means "capture".
    pub fn parse(line: &str, enrolling: bool) -> Result<Command, String> {
        let line = line.trim();
        if line.is_empty() {
            return if enrolling {
                Ok(Command::Capture)
            } else {
                Err(String::new())
            };
        }

        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match verb.to_ascii_lowercase().as_str() {
            "enroll" => Ok(Command::Enroll),
            "reenroll" | "re-enroll" => Ok(Command::Reenroll),
            "forget" => Ok(Command::Forget),
            "capture" => Ok(Command::Capture),
            "cancel" => Ok(Command::Cancel),
            "login" => {
                let rest = rest.trim_start();
                let (identifier, pass_phrase) =
                    rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(Command::Login {
                    identifier: identifier.to_string(),
                    pass_phrase: pass_phrase.trim().to_string(),
                })
            }
            "signout" | "sign-out" | "logout" => Ok(Command::SignOut),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: {other} (type `help`)")),
        }
    }

    /// Login credentials carried by this command, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        match self {
            Command::Login {
                identifier,
                pass_phrase,
            } => Some(Credentials::new(identifier.clone(), pass_phrase.clone())),
            _ => None,
        }
    }
}

pub fn banner() -> String {
    "AURA SECURE\nAdvanced Neural Facial Recognition Interface".to_string()
}

pub fn help() -> &'static str {
    "commands:\n  \
     enroll                       begin biometric enrollment\n  \
     capture | <enter>            capture the requested pose\n  \
     cancel                       abandon enrollment\n  \
     reenroll                     discard the profile and enroll again\n  \
     forget                       discard the profile\n  \
     login <id> <pass phrase>     identify and log in\n  \
     signout                      leave the granted terminal\n  \
     status                       show the current screen\n  \
     quit                         exit"
}

/// Render the screen for a session snapshot.
pub fn render(view: &SessionView) -> String {
    match view.state {
        SessionState::Idle | SessionState::Error => render_form(view),
        SessionState::Enrolling => {
            let pose = view.pending_pose.unwrap_or(aura_core::Pose::Frontal);
            format!(
                "[{} PROFILE] {}  (enter to capture, `cancel` to abort)",
                pose.label(),
                pose.prompt()
            )
        }
        SessionState::Scanning | SessionState::Verifying => {
            let mut out = format!(
                "[{}] BIO-MESH COMPARISON {:>3}%",
                view.sub_phase, view.progress
            );
            if view.state == SessionState::Verifying {
                out.push_str(&format!(
                    "\nComparing current scan with enrolled profile {}...",
                    operative(view)
                ));
            }
            out
        }
        SessionState::Success => {
            let mut out = format!(
                "ACCESS GRANTED\nTerminal 0xFD Open for Operative {}",
                operative(view)
            );
            if let Some(report) = &view.report {
                out.push_str(&format!(
                    "\nmatch {:.1}%  threat {}",
                    report.biometric_match, report.threat_level
                ));
                if !report.message.is_empty() {
                    out.push_str(&format!("\n\"{}\"", report.message));
                }
            }
            out.push_str("\n(`signout` to leave)");
            out
        }
    }
}

fn render_form(view: &SessionView) -> String {
    if !view.enrolled {
        return "BIOMETRIC ENROLLMENT REQUIRED\n\
                Initialize your biological profile to access the terminal. Type `enroll`."
            .to_string();
    }

    let mut out = String::from(
        "PROFILE ENROLLED  (`reenroll` or `forget`)\nlogin <OPERATIVE_ID> <NEURAL_PASS>",
    );
    if view.state == SessionState::Error {
        if let Some(report) = &view.report {
            out.push_str(&format!(
                "\nACCESS DENIED [{} threat, match {:.1}%]: {}",
                report.threat_level, report.biometric_match, report.message
            ));
        }
    }
    out
}

fn operative(view: &SessionView) -> String {
    view.operative
        .as_deref()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}

/// Notice for a capture that produced no frame.
pub fn render_skip(reason: &str) -> String {
    format!("no camera frame available ({reason}); try again")
}

/// Explain a rejected command.
pub fn render_rejection(err: &SessionError) -> String {
    match err {
        SessionError::MissingIdentifier => "OPERATIVE_ID required".to_string(),
        SessionError::MissingPassPhrase => "NEURAL_PASS required".to_string(),
        SessionError::MissingProfile => "no biometric profile; type `enroll` first".to_string(),
        other => other.to_string(),
    }
}
