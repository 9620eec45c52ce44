//! Busy indicators for the CLI.
//!
//! Loading a document and waiting on the generation service can both take
//! a while. Reporters write to **stderr** so stdout carries only answers
//! and command output.

use serde_json::{json, Value};
use std::io::Write;

/// Something the CLI is busy with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Extracting {
        document: String,
    },
    Loaded {
        document: String,
        segments: u64,
        words: u64,
    },
    /// A generation request is in flight.
    Thinking,
    /// The generation request finished, successfully or not.
    Answered,
}

impl ProgressEvent {
    /// One terminal line, or `None` for events with nothing to show.
    fn human_line(&self) -> Option<String> {
        match self {
            ProgressEvent::Extracting { document } => Some(format!("reading {}...", document)),
            ProgressEvent::Loaded {
                document,
                segments,
                words,
            } => Some(format!(
                "loaded {}  {} segments  {} words",
                document,
                group_thousands(*segments),
                group_thousands(*words)
            )),
            ProgressEvent::Thinking => Some("thinking...".to_string()),
            ProgressEvent::Answered => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ProgressEvent::Extracting { document } => {
                json!({ "event": "progress", "phase": "extracting", "document": document })
            }
            ProgressEvent::Loaded {
                document,
                segments,
                words,
            } => json!({
                "event": "progress",
                "phase": "loaded",
                "document": document,
                "segments": segments,
                "words": words
            }),
            ProgressEvent::Thinking => json!({ "event": "progress", "phase": "thinking" }),
            ProgressEvent::Answered => json!({ "event": "progress", "phase": "answered" }),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

fn write_stderr_line(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
    let _ = stderr.flush();
}

/// Short status lines such as `loaded manual.pdf  12 segments  3,412 words`.
pub struct HumanProgress;

impl ProgressReporter for HumanProgress {
    fn report(&self, event: ProgressEvent) {
        if let Some(line) = event.human_line() {
            write_stderr_line(&line);
        }
    }
}

/// One JSON object per event, for wrappers that drive `cqa`.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        write_stderr_line(&event.to_json().to_string());
    }
}

pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Value of the global `--progress` flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `Human` when stderr is a terminal, `Off` when it is piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(SilentProgress),
            ProgressMode::Human => Box::new(HumanProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
