//! CLI command implementations.
//!
//! Each `run_*` function backs one `cqa` subcommand. Results go to stdout;
//! progress and diagnostics go to stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::extract::content_type_for_path;
use crate::generation::GenerationService;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::session::{LoadedDocument, Session, SessionSettings};

/// Read `path` and load it into `session`, reporting progress.
pub fn load_file<'s>(
    session: &'s mut Session,
    path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<&'s LoadedDocument> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    progress.report(ProgressEvent::Extracting {
        document: name.clone(),
    });

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = content_type_for_path(path);
    let doc = session
        .load_document(&name, &bytes, content_type)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    progress.report(ProgressEvent::Loaded {
        document: doc.name.clone(),
        segments: doc.segments.len() as u64,
        words: doc.segments.word_count() as u64,
    });
    Ok(doc)
}

fn settings_with_size(config: &Config, size: Option<usize>) -> Result<SessionSettings> {
    let mut settings = SessionSettings::from_config(config);
    if let Some(size) = size {
        if size == 0 {
            bail!("--size must be > 0");
        }
        settings.segment_size = size;
    }
    Ok(settings)
}

/// `cqa segments`: print every segment of a document.
pub fn run_segments(
    config: &Config,
    path: &Path,
    size: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let mut session = Session::new(settings_with_size(config, size)?);
    let doc = load_file(&mut session, path, progress)?;

    if doc.segments.is_empty() {
        println!("No segments.");
        return Ok(());
    }

    for segment in &doc.segments {
        println!("[segment {}] ({} words)", segment.index, segment.word_count());
        println!("{}", segment.text);
        println!();
    }
    Ok(())
}

/// `cqa rank`: print the segment that best matches `query`.
pub fn run_rank(
    config: &Config,
    path: &Path,
    query: &str,
    size: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let mut session = Session::new(settings_with_size(config, size)?);
    load_file(&mut session, path, progress)?;

    match session.context_for(query)? {
        Some(ranked) => {
            println!(
                "segment: {}  score: {:.4}",
                ranked.segment.index, ranked.score
            );
            println!("{}", ranked.segment.text);
        }
        None => println!("No segments."),
    }
    Ok(())
}

/// `cqa ask`: one question against a document.
pub async fn run_ask(
    config: &Config,
    generator: &dyn GenerationService,
    path: &Path,
    question: &str,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let mut session = Session::new(SessionSettings::from_config(config));
    load_file(&mut session, path, progress)?;

    progress.report(ProgressEvent::Thinking);
    let result = session.ask(generator, question).await;
    progress.report(ProgressEvent::Answered);

    let outcome = result?;
    println!("{}", outcome.reply);
    Ok(())
}

enum ChatCommand<'a> {
    Ask(&'a str),
    Load(&'a str),
    Reset,
    History,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Option<ChatCommand<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ChatCommand::Ask(line));
    };
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    Some(match cmd {
        "load" if !arg.is_empty() => ChatCommand::Load(arg),
        "reset" => ChatCommand::Reset,
        "history" => ChatCommand::History,
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(line),
    })
}

const CHAT_HELP: &str = "\
Commands:
  /load <path>   replace the document
  /reset         clear the document and the conversation
  /history       print the conversation so far
  /quit          exit
Anything else is sent as a question.";

/// `cqa chat`: interactive loop over stdin.
///
/// Generation failures are printed and the loop continues; the question
/// that failed stays in the conversation.
pub async fn run_chat(
    config: &Config,
    generator: &dyn GenerationService,
    path: Option<&Path>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let mut session = Session::new(SessionSettings::from_config(config));
    if let Some(path) = path {
        load_file(&mut session, path, progress)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            None => continue,
            Some(ChatCommand::Quit) => break,
            Some(ChatCommand::Help) => println!("{}", CHAT_HELP),
            Some(ChatCommand::Unknown(cmd)) => {
                eprintln!("Unknown command: {} (try /help)", cmd);
            }
            Some(ChatCommand::Reset) => {
                session.reset();
                println!("Session cleared.");
            }
            Some(ChatCommand::History) => {
                if session.history().is_empty() {
                    println!("(no messages)");
                }
                for turn in session.history() {
                    println!("{}: {}", turn.role, turn.content);
                }
            }
            Some(ChatCommand::Load(arg)) => {
                if let Err(e) = load_file(&mut session, Path::new(arg), progress) {
                    eprintln!("Error: {:#}", e);
                }
            }
            Some(ChatCommand::Ask(query)) => {
                progress.report(ProgressEvent::Thinking);
                let result = session.ask(generator, query).await;
                progress.report(ProgressEvent::Answered);
                match result {
                    Ok(outcome) => println!("{}", outcome.reply),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
    }

    Ok(())
}
