use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use intake_core::audit::{AuditSink, TracingAuditSink};
use intake_core::config::{AppConfig, ExtractorMode, ReplyStyle};
use intake_core::domain::session::{Session, SessionId, TranscriptEntry};
use intake_core::errors::ApplicationError;
use intake_core::validation::render_form_status;
use intake_db::SessionRepository;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::coordinator::{TurnCoordinator, TurnOutcome};
use crate::extraction::{FieldExtractor, LlmExtractor, RuleBasedExtractor};
use crate::llm::build_client;
use crate::reply::{LlmReplyWriter, ReplyWriter, TemplateReplyWriter, GREETING};
use crate::stream::{stream_reply, ReplyChunk};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedSession {
    pub id: SessionId,
    pub greeting: String,
}

/// A committed turn whose reply is still being delivered.
pub struct ReplyStream {
    pub outcome: TurnOutcome,
    pub chunks: mpsc::Receiver<ReplyChunk>,
}

/// Session lifecycle around the turn coordinator. Turns for one session run
/// one at a time; different sessions proceed independently.
pub struct AgentRuntime {
    coordinator: TurnCoordinator,
    sessions: Arc<dyn SessionRepository>,
    turn_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    stream_chunk_words: usize,
}

impl AgentRuntime {
    pub fn new(
        coordinator: TurnCoordinator,
        sessions: Arc<dyn SessionRepository>,
        stream_chunk_words: usize,
    ) -> Self {
        Self { coordinator, sessions, turn_locks: Mutex::new(HashMap::new()), stream_chunk_words }
    }

    pub fn from_config(config: &AppConfig, sessions: Arc<dyn SessionRepository>) -> Result<Self> {
        let client = if config.assistant.uses_llm() {
            Some(build_client(&config.llm).context("failed to build model client")?)
        } else {
            None
        };

        let extractor: Arc<dyn FieldExtractor> = match (config.assistant.extractor, &client) {
            (ExtractorMode::Llm, Some(client)) => Arc::new(LlmExtractor::new(client.clone())),
            _ => Arc::new(
                RuleBasedExtractor::new().context("failed to compile extraction patterns")?,
            ),
        };
        let replies: Arc<dyn ReplyWriter> = match (config.assistant.reply_style, &client) {
            (ReplyStyle::Llm, Some(client)) => Arc::new(LlmReplyWriter::new(client.clone())),
            _ => Arc::new(TemplateReplyWriter),
        };
        let audit_sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

        let coordinator = TurnCoordinator::new(
            extractor,
            replies,
            audit_sink,
            Duration::from_secs(config.assistant.extraction_timeout_secs),
        );
        info!(
            event_name = "runtime.ready",
            extractor = coordinator.extractor_name(),
            replies = coordinator.reply_writer_name(),
            "agent runtime configured"
        );

        Ok(Self::new(coordinator, sessions, config.assistant.stream_chunk_words))
    }

    pub async fn start_session(&self) -> Result<StartedSession, ApplicationError> {
        let session = Session::new(SessionId::generate());
        let id = session.id.clone();
        self.sessions.save(session).await?;

        info!(event_name = "session.started", session_id = %id, "session started");
        Ok(StartedSession { id, greeting: GREETING.to_string() })
    }

    pub async fn session(&self, id: &SessionId) -> Result<Session, ApplicationError> {
        self.sessions
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::SessionNotFound(id.clone()))
    }

    pub async fn handle_message(
        &self,
        id: &SessionId,
        message: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let lock = self.turn_lock(id).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(id, message).await
        };
        self.release_turn_lock(id, lock).await;
        result
    }

    async fn run_turn(&self, id: &SessionId, message: &str) -> Result<TurnOutcome, ApplicationError> {
        let mut session = self.session(id).await?;
        let outcome = self.coordinator.process_turn(&mut session, message).await?;
        self.sessions.save(session).await?;
        Ok(outcome)
    }

    /// Commits and saves the turn, then streams the reply. Dropping the
    /// receiver stops delivery but never undoes the turn.
    pub async fn stream_message(
        &self,
        id: &SessionId,
        message: &str,
    ) -> Result<ReplyStream, ApplicationError> {
        let outcome = self.handle_message(id, message).await?;
        let (chunks, _producer) = stream_reply(outcome.reply.clone(), self.stream_chunk_words);
        Ok(ReplyStream { outcome, chunks })
    }

    /// Waits for an in-flight turn on the session before deleting it.
    pub async fn end_session(&self, id: &SessionId) -> Result<(), ApplicationError> {
        let lock = self.turn_lock(id).await;
        let removed = {
            let _turn = lock.lock().await;
            self.sessions.delete(id).await
        };
        self.release_turn_lock(id, lock).await;
        if !removed? {
            return Err(ApplicationError::SessionNotFound(id.clone()));
        }

        info!(event_name = "session.ended", session_id = %id, "session ended");
        Ok(())
    }

    pub async fn transcript(&self, id: &SessionId) -> Result<Vec<TranscriptEntry>, ApplicationError> {
        Ok(self.session(id).await?.transcript.entries().to_vec())
    }

    /// Markdown status board for the session's form.
    pub async fn form_status(&self, id: &SessionId) -> Result<String, ApplicationError> {
        Ok(render_form_status(&self.session(id).await?.form))
    }

    async fn turn_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks.entry(id.clone()).or_default().clone()
    }

    /// Drops the map entry once nobody else holds or waits on the lock.
    async fn release_turn_lock(&self, id: &SessionId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.turn_locks.lock().await;
        if locks.get(id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(id);
        }
    }
}
