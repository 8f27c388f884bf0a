use crate::context::{assemble_within, DEFAULT_MAX_CONTEXT_CHARS};
use crate::doc_processor::{self, ExtractionError, LoadedDocument};
use crate::llm::LlmBackend;
use crate::qa::{self, ModelAnswer, QueryError};
use crate::session::{Action, ChatMessage, Mode, StudySession};
use crate::views::{self, DerivedView, ViewKind};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("No document is loaded")]
    NoDocument,
    #[error("Another request is still in progress")]
    Busy,
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("The {0} mode has no generated view")]
    NotAView(Mode),
    #[error("The session was reset before the request finished")]
    Superseded,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl serde::Serialize for WorkspaceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub struct UploadTicket {
    epoch: u64,
    path: PathBuf,
}

impl UploadTicket {
    /// Extract the document off the async runtime's worker threads
    pub async fn run(&self) -> Result<LoadedDocument, ExtractionError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || doc_processor::load_document(&path))
            .await
            .map_err(|e| ExtractionError::Parse(format!("extraction task failed: {}", e)))?
    }
}

pub struct QuestionTicket {
    epoch: u64,
    question: String,
    context: String,
    history: Vec<ChatMessage>,
    page_count: u32,
}

impl QuestionTicket {
    pub async fn run<B: LlmBackend + ?Sized>(
        &self,
        backend: &B,
        model: &str,
    ) -> Result<ModelAnswer, QueryError> {
        qa::ask(
            backend,
            model,
            &self.question,
            &self.context,
            &self.history,
            self.page_count,
        )
        .await
    }
}

pub struct ViewTicket {
    epoch: u64,
    kind: ViewKind,
    context: String,
    history: Vec<ChatMessage>,
    page_count: u32,
}

impl ViewTicket {
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub async fn run<B: LlmBackend + ?Sized>(
        &self,
        backend: &B,
        model: &str,
    ) -> Result<DerivedView, QueryError> {
        views::generate(
            backend,
            model,
            self.kind,
            &self.context,
            &self.history,
            self.page_count,
        )
        .await
    }
}

pub struct Workspace {
    session: StudySession,
    max_context_chars: usize,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            session: StudySession::new(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_context_budget(mut self, max_chars: usize) -> Self {
        self.set_context_budget(max_chars);
        self
    }

    pub fn set_context_budget(&mut self, max_chars: usize) {
        self.max_context_chars = max_chars.max(1);
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    fn context(&self) -> Result<(String, u32), WorkspaceError> {
        let document = self.session.document().ok_or(WorkspaceError::NoDocument)?;
        let assembled = assemble_within(&document.chunks, self.max_context_chars);
        Ok((assembled.text, document.page_count()))
    }

    // Each request is begin (validate, snapshot) → ticket.run (awaited, no
    // borrow of the workspace) → finish. Results from before a reset or a
    // new upload are discarded.

    // ── Upload ──

    pub fn begin_upload(&mut self, path: &Path) -> Result<UploadTicket, WorkspaceError> {
        if self.session.is_loading_document() {
            return Err(WorkspaceError::Busy);
        }
        self.session.apply(Action::UploadStarted);
        Ok(UploadTicket {
            epoch: self.session.epoch(),
            path: path.to_path_buf(),
        })
    }

    pub fn finish_upload(
        &mut self,
        ticket: UploadTicket,
        result: Result<LoadedDocument, ExtractionError>,
    ) -> Result<(), WorkspaceError> {
        if ticket.epoch != self.session.epoch() {
            log::info!("Dropping extraction result for {:?}: session was reset", ticket.path);
            return Err(WorkspaceError::Superseded);
        }
        match result {
            Ok(document) => {
                self.session.apply(Action::UploadSucceeded { document });
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to process {:?}: {}", ticket.path, e);
                self.session.apply(Action::UploadFailed);
                Err(e.into())
            }
        }
    }

    pub async fn upload(&mut self, path: &Path) -> Result<(), WorkspaceError> {
        let ticket = self.begin_upload(path)?;
        let result = ticket.run().await;
        self.finish_upload(ticket, result)
    }

    // ── Questions ──

    pub fn begin_ask(&mut self, question: &str) -> Result<QuestionTicket, WorkspaceError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(WorkspaceError::EmptyQuestion);
        }
        if self.session.is_answering() || self.session.is_loading_document() {
            return Err(WorkspaceError::Busy);
        }
        let (context, page_count) = self.context()?;
        let history = self.session.messages().to_vec();

        self.session.apply(Action::QuestionAsked {
            question: question.to_string(),
        });

        Ok(QuestionTicket {
            epoch: self.session.epoch(),
            question: question.to_string(),
            context,
            history,
            page_count,
        })
    }

    /// Record the outcome of a question; the new turn is the last message.
    /// A failure is still recorded as an error turn before it is returned.
    pub fn finish_ask(
        &mut self,
        ticket: QuestionTicket,
        result: Result<ModelAnswer, QueryError>,
    ) -> Result<(), WorkspaceError> {
        if ticket.epoch != self.session.epoch() {
            log::info!("Dropping answer to {:?}: session was reset", ticket.question);
            return Err(WorkspaceError::Superseded);
        }
        match result {
            Ok(answer) => {
                self.session.apply(Action::AnswerReceived { answer });
                Ok(())
            }
            Err(e) => {
                log::error!("Question failed: {}", e);
                self.session.apply(Action::AnswerFailed);
                Err(e.into())
            }
        }
    }

    pub async fn ask<B: LlmBackend + ?Sized>(
        &mut self,
        backend: &B,
        model: &str,
        question: &str,
    ) -> Result<(), WorkspaceError> {
        let ticket = self.begin_ask(question)?;
        let result = ticket.run(backend, model).await;
        self.finish_ask(ticket, result)
    }

    // ── Modes and derived views ──

    pub fn switch_mode(&mut self, mode: Mode) {
        self.session.apply(Action::ModeSwitched(mode));
    }

    pub fn begin_view(&mut self) -> Result<ViewTicket, WorkspaceError> {
        let mode = self.session.mode();
        let kind = ViewKind::from_mode(mode).ok_or(WorkspaceError::NotAView(mode))?;
        if self.session.is_generating() {
            return Err(WorkspaceError::Busy);
        }
        let (context, page_count) = self.context()?;
        let history = self.session.messages().to_vec();
        self.session.apply(Action::ViewRequested(mode));

        Ok(ViewTicket {
            epoch: self.session.epoch(),
            kind,
            context,
            history,
            page_count,
        })
    }

    pub fn finish_view(
        &mut self,
        ticket: ViewTicket,
        result: Result<DerivedView, QueryError>,
    ) -> Result<Option<&DerivedView>, WorkspaceError> {
        if ticket.epoch != self.session.epoch() {
            return Err(WorkspaceError::Superseded);
        }
        match result {
            Ok(view) => {
                self.session.apply(Action::ViewGenerated(view));
                Ok(self.session.view())
            }
            Err(e) => {
                log::error!("Generating {} view failed: {}", ticket.kind.mode(), e);
                self.session.apply(Action::ViewFailed(ticket.kind.mode()));
                Err(e.into())
            }
        }
    }

    /// Generate the view for the current mode. `Ok(None)` means the user
    /// switched away before the result arrived.
    pub async fn generate_view<B: LlmBackend + ?Sized>(
        &mut self,
        backend: &B,
        model: &str,
    ) -> Result<Option<&DerivedView>, WorkspaceError> {
        let ticket = self.begin_view()?;
        let result = ticket.run(backend, model).await;
        self.finish_view(ticket, result)
    }

    pub fn reset(&mut self) {
        self.session.apply(Action::Reset);
    }
}
