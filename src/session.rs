use crate::doc_processor::LoadedDocument;
use crate::qa::ModelAnswer;
use crate::views::DerivedView;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const UPLOAD_ERROR_MESSAGE: &str = "Failed to process the PDF. Please try another file.";
pub const ANSWER_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while trying to answer. Please try again.";
pub const VIEW_ERROR_MESSAGE: &str =
    "Sorry, I couldn't generate this view from the document. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Qa,
    Practice,
    Glossary,
    Flashcards,
    #[serde(rename = "mindmap")]
    MindMap,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Qa,
        Mode::Practice,
        Mode::Glossary,
        Mode::Flashcards,
        Mode::MindMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Qa => "qa",
            Mode::Practice => "practice",
            Mode::Glossary => "glossary",
            Mode::Flashcards => "flashcards",
            Mode::MindMap => "mindmap",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown mode: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// The excerpt a model answer was drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub page_number: Option<u32>,
    pub content: String,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            source: None,
            is_error: false,
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            source: None,
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::model(content)
        }
    }

    fn from_answer(answer: ModelAnswer) -> Self {
        let source = answer.source.map(|content| Source {
            page_number: answer.page_number,
            content,
        });
        Self {
            source,
            ..Self::model(answer.answer)
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    UploadStarted,
    UploadSucceeded { document: LoadedDocument },
    UploadFailed,
    QuestionAsked { question: String },
    AnswerReceived { answer: ModelAnswer },
    AnswerFailed,
    ModeSwitched(Mode),
    ViewRequested(Mode),
    ViewGenerated(DerivedView),
    ViewFailed(Mode),
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct StudySession {
    document: Option<LoadedDocument>,
    messages: Vec<ChatMessage>,
    mode: Mode,
    view: Option<DerivedView>,
    error: Option<String>,
    is_loading_document: bool,
    is_answering: bool,
    /// Modes with a view request in flight
    generating: HashSet<Mode>,
    epoch: u64,
}

impl StudySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn view(&self) -> Option<&DerivedView> {
        self.view.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading_document(&self) -> bool {
        self.is_loading_document
    }

    pub fn is_answering(&self) -> bool {
        self.is_answering
    }

    /// Whether the current mode's view is being generated
    pub fn is_generating(&self) -> bool {
        self.generating.contains(&self.mode)
    }

    /// Bumped whenever the document and conversation are cleared
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::UploadStarted => {
                self.clear();
                self.is_loading_document = true;
            }
            Action::UploadSucceeded { document } => {
                self.messages.push(ChatMessage::model(format!(
                    "Successfully processed \"{}\". I'm ready to answer your questions about it.",
                    document.file_name
                )));
                self.document = Some(document);
                self.is_loading_document = false;
            }
            Action::UploadFailed => {
                self.document = None;
                self.error = Some(UPLOAD_ERROR_MESSAGE.to_string());
                self.is_loading_document = false;
            }
            Action::QuestionAsked { question } => {
                self.messages.push(ChatMessage::user(question));
                self.is_answering = true;
                self.error = None;
            }
            Action::AnswerReceived { answer } => {
                self.messages.push(ChatMessage::from_answer(answer));
                self.is_answering = false;
            }
            Action::AnswerFailed => {
                self.error = Some(ANSWER_ERROR_MESSAGE.to_string());
                self.messages.push(ChatMessage::error(ANSWER_ERROR_MESSAGE));
                self.is_answering = false;
            }
            Action::ModeSwitched(mode) => {
                self.mode = mode;
                self.view = None;
            }
            Action::ViewRequested(mode) => {
                self.generating.insert(mode);
                self.error = None;
            }
            Action::ViewGenerated(view) => {
                self.generating.remove(&view.mode());
                // A result for a mode the user already left is dropped
                if view.mode() == self.mode {
                    self.view = Some(view);
                }
            }
            Action::ViewFailed(mode) => {
                self.generating.remove(&mode);
                if mode == self.mode {
                    self.error = Some(VIEW_ERROR_MESSAGE.to_string());
                }
            }
            Action::Reset => self.clear(),
        }
    }

    fn clear(&mut self) {
        self.document = None;
        self.messages.clear();
        self.mode = Mode::Qa;
        self.view = None;
        self.error = None;
        self.is_loading_document = false;
        self.is_answering = false;
        self.generating.clear();
        self.epoch += 1;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            file_name: self.document.as_ref().map(|d| d.file_name.clone()),
            page_count: self.document.as_ref().map_or(0, |d| d.page_count()),
            messages: self.messages.clone(),
            mode: self.mode,
            view: self.view.clone(),
            error: self.error.clone(),
            is_loading_document: self.is_loading_document,
            is_answering: self.is_answering,
            is_generating: self.is_generating(),
        }
    }
}

/// What a frontend needs to render the session, without the page text
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub file_name: Option<String>,
    pub page_count: u32,
    pub messages: Vec<ChatMessage>,
    pub mode: Mode,
    pub view: Option<DerivedView>,
    pub error: Option<String>,
    pub is_loading_document: bool,
    pub is_answering: bool,
    pub is_generating: bool,
}
