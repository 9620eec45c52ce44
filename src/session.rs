//! Session-scoped conversation state.
//!
//! A [`Session`] owns everything one user accumulates: the loaded document
//! (text, segments, term index) and the transcript. Every operation takes
//! the session explicitly, so two sessions never share mutable state.
//!
//! # Turn Lifecycle
//!
//! 1. The query is appended to the history as a `user` turn, exactly as
//!    typed.
//! 2. If a document with at least one segment is loaded, the ranker picks
//!    the best segment; otherwise the context is empty and the ranker is
//!    not called.
//! 3. The prompt is rendered from the context and the most recent
//!    `history_limit` turns.
//! 4. On success the trimmed reply is appended as an `assistant` turn. On
//!    failure the error is returned and the `user` turn stays in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use context_qa_core::error::RetrievalError;
use context_qa_core::models::{ConversationTurn, SegmentCollection};
use context_qa_core::prompt::{history_window, PromptTemplate};
use context_qa_core::rank::{best_match_indexed, Ranked, TermIndex};
use context_qa_core::segment::segment;

use crate::config::Config;
use crate::extract::{extract_text, ExtractError, MIME_TEXT};
use crate::generation::{GenerationError, GenerationRequest, GenerationService};

/// Failure of a session operation.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unreadable document: {0}")]
    UnreadableDocument(#[from] ExtractError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Per-session knobs, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub segment_size: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub history_limit: Option<usize>,
    pub template: PromptTemplate,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            segment_size: config.segmentation.size,
            max_output_tokens: config.generation.max_output_tokens,
            temperature: config.generation.temperature,
            history_limit: config.conversation.history_limit(),
            template: config.conversation.template(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The document currently loaded into a session.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub name: String,
    pub content_type: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub fingerprint: String,
    pub text: String,
    pub segments: SegmentCollection,
    pub loaded_at: DateTime<Utc>,
    index: TermIndex,
}

/// Serializable view of a [`LoadedDocument`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub content_type: String,
    pub fingerprint: String,
    pub segments: usize,
    pub words: usize,
    pub segment_size: usize,
    pub vocabulary: usize,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedDocument {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            fingerprint: self.fingerprint.clone(),
            segments: self.segments.len(),
            words: self.segments.word_count(),
            segment_size: self.segments.size(),
            vocabulary: self.index.vocabulary_size(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Which segment was used as context for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextMatch {
    pub index: usize,
    pub score: f64,
}

impl From<&Ranked<'_>> for ContextMatch {
    fn from(ranked: &Ranked<'_>) -> Self {
        Self {
            index: ranked.segment.index,
            score: ranked.score,
        }
    }
}

/// Result of a successful [`Session::ask`].
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub context: Option<ContextMatch>,
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    settings: SessionSettings,
    document: Option<LoadedDocument>,
    history: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            settings,
            document: None,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Extract, segment, and install an uploaded document, replacing any
    /// previous one. On failure the previous document stays loaded.
    pub fn load_document(
        &mut self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<&LoadedDocument, ChatError> {
        let text = extract_text(bytes, content_type).inspect_err(|e| {
            tracing::warn!(
                session = %self.id,
                document = name,
                error = %e,
                "document extraction failed"
            );
        })?;
        self.install(name, content_type, fingerprint(bytes), text)
    }

    /// Install already-extracted text as the session document.
    pub fn load_text(&mut self, name: &str, text: &str) -> Result<&LoadedDocument, ChatError> {
        self.install(name, MIME_TEXT, fingerprint(text.as_bytes()), text.to_string())
    }

    fn install(
        &mut self,
        name: &str,
        content_type: &str,
        fingerprint: String,
        text: String,
    ) -> Result<&LoadedDocument, ChatError> {
        let segments = segment(&text, self.settings.segment_size)?;
        let index = TermIndex::build(&segments);
        tracing::info!(
            session = %self.id,
            document = name,
            segments = segments.len(),
            words = segments.word_count(),
            "document loaded"
        );

        let document = LoadedDocument {
            name: name.to_string(),
            content_type: content_type.to_string(),
            fingerprint,
            text,
            segments,
            loaded_at: Utc::now(),
            index,
        };
        Ok(self.document.insert(document))
    }

    /// Drop the loaded document, keeping the transcript.
    pub fn clear_document(&mut self) {
        self.document = None;
    }

    /// Start over: no document, empty transcript.
    pub fn reset(&mut self) {
        self.document = None;
        self.history.clear();
        tracing::info!(session = %self.id, "session reset");
    }

    /// Best segment for `query`, or `None` when there is nothing to rank.
    pub fn context_for(&self, query: &str) -> Result<Option<Ranked<'_>>, ChatError> {
        match &self.document {
            Some(doc) if !doc.segments.is_empty() => {
                Ok(Some(best_match_indexed(&doc.segments, &doc.index, query)?))
            }
            _ => Ok(None),
        }
    }

    /// Prompt for the current history and the given context.
    pub fn prompt_for(&self, context: Option<&str>) -> String {
        let window = history_window(&self.history, self.settings.history_limit);
        self.settings.template.render(window, context)
    }

    /// Run one conversation turn against `generator`.
    ///
    /// # Errors
    ///
    /// - [`ChatError::Retrieval`] with `InvalidArgument` for an empty query
    ///   (nothing is recorded).
    /// - [`ChatError::Generation`] when the service call fails; the user
    ///   turn stays in the history and no assistant turn is added.
    pub async fn ask(
        &mut self,
        generator: &dyn GenerationService,
        query: &str,
    ) -> Result<TurnOutcome, ChatError> {
        if query.trim().is_empty() {
            let err = RetrievalError::InvalidArgument("query must not be empty".to_string());
            return Err(err.into());
        }

        self.history.push(ConversationTurn::user(query));

        let (context_text, context) = match self.context_for(query)? {
            Some(ranked) => {
                tracing::debug!(
                    session = %self.id,
                    segment = ranked.segment.index,
                    score = ranked.score,
                    "context segment selected"
                );
                (Some(ranked.segment.text.clone()), Some(ContextMatch::from(&ranked)))
            }
            None => (None, None),
        };

        let request = GenerationRequest {
            prompt: self.prompt_for(context_text.as_deref()),
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        match generator.generate(&request).await {
            Ok(response) => {
                let reply = response.generated_text.trim().to_string();
                self.history.push(ConversationTurn::assistant(reply.clone()));
                Ok(TurnOutcome { reply, context })
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    service = generator.name(),
                    error = %e,
                    "generation failed"
                );
                Err(e.into())
            }
        }
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_qa_core::models::Role;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::generation::GenerationResponse;

    /// Returns queued results in order and records every prompt it sees.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<GenerationResponse, GenerationError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&str, GenerationError>>) -> Self {
            let replies = replies
                .into_iter()
                .rev()
                .map(|r| {
                    r.map(|text| GenerationResponse {
                        generated_text: text.to_string(),
                    })
                })
                .collect();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| {
                    Err(GenerationError::ServiceUnavailable(
                        "script exhausted".into(),
                    ))
                })
        }
    }

    fn small_settings() -> SessionSettings {
        SessionSettings {
            segment_size: 5,
            ..SessionSettings::default()
        }
    }

    #[tokio::test]
    async fn ask_uses_best_segment_as_context() {
        let mut session = Session::new(small_settings());
        session
            .load_text("pets.txt", "the cat sat on the mat the dog ran fast")
            .unwrap();
        let generator = ScriptedGenerator::new(vec![Ok("  In the second half.  ")]);

        let outcome = session.ask(&generator, "where is the dog").await.unwrap();
        assert_eq!(outcome.reply, "In the second half.");
        assert_eq!(outcome.context.unwrap().index, 1);

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("\n\nmat the dog ran fast\n\n"));
        assert!(prompt.contains("User: where is the dog"));
        assert!(!prompt.contains("the cat sat on the\n"));

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ConversationTurn::assistant("In the second half."));
    }

    #[tokio::test]
    async fn empty_document_proceeds_without_context() {
        let mut session = Session::new(small_settings());
        let doc = session.load_text("empty.txt", "").unwrap();
        assert!(doc.segments.is_empty());
        assert!(session.context_for("anything").unwrap().is_none());

        let generator = ScriptedGenerator::new(vec![Ok("No document content.")]);
        let outcome = session.ask(&generator, "what does it say?").await.unwrap();
        assert!(outcome.context.is_none());
        assert!(generator.prompts()[0].contains("question:\n\n\n\nConversation:"));
    }

    #[tokio::test]
    async fn no_document_proceeds_without_context() {
        let mut session = Session::new(small_settings());
        let generator = ScriptedGenerator::new(vec![Ok("hello")]);
        let outcome = session.ask(&generator, "hi").await.unwrap();
        assert!(outcome.context.is_none());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn timeout_keeps_user_turn_only() {
        let mut session = Session::new(small_settings());
        session.load_text("pets.txt", "the dog ran fast").unwrap();
        let generator =
            ScriptedGenerator::new(vec![Err(GenerationError::Timeout(Duration::from_secs(30)))]);

        let err = session.ask(&generator, "where is the dog").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(GenerationError::Timeout(_))));

        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "where is the dog");
    }

    #[tokio::test]
    async fn failed_turn_is_visible_in_next_prompt() {
        let mut session = Session::new(small_settings());
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::RateLimited("slow down".into())),
            Ok("answer two"),
        ]);
        assert!(session.ask(&generator, "first").await.is_err());
        session.ask(&generator, "second").await.unwrap();

        let prompts = generator.prompts();
        assert!(prompts[1].contains("User: first\nUser: second"));
        let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_recording() {
        let mut session = Session::new(small_settings());
        let generator = ScriptedGenerator::new(vec![]);
        let err = session.ask(&generator, "   ").await.unwrap_err();
        assert!(matches!(err, ChatError::Retrieval(RetrievalError::InvalidArgument(_))));
        assert!(session.history().is_empty());
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn query_is_recorded_as_typed() {
        let mut session = Session::new(small_settings());
        session
            .load_text("pets.txt", "the cat sat on the mat the dog ran fast")
            .unwrap();
        let generator = ScriptedGenerator::new(vec![Ok("fast")]);

        let outcome = session.ask(&generator, "  where is the dog?\n").await.unwrap();
        assert_eq!(outcome.context.unwrap().index, 1);
        assert_eq!(
            session.history()[0],
            ConversationTurn::user("  where is the dog?\n")
        );
    }

    #[tokio::test]
    async fn history_limit_bounds_prompt() {
        let settings = SessionSettings {
            history_limit: Some(2),
            ..small_settings()
        };
        let mut session = Session::new(settings);
        let generator = ScriptedGenerator::new(vec![Ok("a1"), Ok("a2")]);
        session.ask(&generator, "q1").await.unwrap();
        session.ask(&generator, "q2").await.unwrap();

        let prompt = &generator.prompts()[1];
        assert!(!prompt.contains("User: q1"));
        assert!(prompt.contains("Assistant: a1\nUser: q2"));
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn unreadable_upload_keeps_previous_document() {
        let mut session = Session::new(small_settings());
        session.load_text("good.txt", "alpha beta gamma").unwrap();

        let err = session
            .load_document("broken.pdf", b"definitely not a pdf", "application/pdf")
            .unwrap_err();
        assert!(matches!(err, ChatError::UnreadableDocument(_)));

        let doc = session.document().unwrap();
        assert_eq!(doc.name, "good.txt");
        assert_eq!(doc.segments.len(), 1);
    }

    #[test]
    fn reupload_replaces_segments() {
        let mut session = Session::new(small_settings());
        session.load_text("a.txt", "one two three four five six").unwrap();
        assert_eq!(session.document().unwrap().segments.len(), 2);

        let doc = session
            .load_document("b.md", b"seven eight", "text/markdown")
            .unwrap();
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.content_type, "text/markdown");
        assert_eq!(doc.fingerprint.len(), 64);
    }

    #[tokio::test]
    async fn reset_clears_document_and_history() {
        let mut session = Session::new(small_settings());
        session.load_text("a.txt", "one two").unwrap();
        let generator = ScriptedGenerator::new(vec![Ok("ok")]);
        session.ask(&generator, "q").await.unwrap();

        let id = session.id();
        session.reset();
        assert!(session.document().is_none());
        assert!(session.history().is_empty());
        assert_eq!(session.id(), id);
    }

    #[test]
    fn summary_counts() {
        let mut session = Session::new(small_settings());
        let summary = session
            .load_text("a.txt", "Dog dog cat bird fish lion tiger")
            .unwrap()
            .summary();
        assert_eq!(summary.segments, 2);
        assert_eq!(summary.words, 7);
        assert_eq!(summary.segment_size, 5);
        assert_eq!(summary.vocabulary, 6);
    }
}
