use crate::llm::{self, ChatRequest, LlmBackend};
use crate::qa::{page_in_range, parse_json, QueryError};
use crate::session::{ChatMessage, Mode, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PRACTICE_QUESTION_COUNT: usize = 5;
const GLOSSARY_TERM_LIMIT: usize = 20;
const FLASHCARD_COUNT: usize = 10;
const MIND_MAP_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "Multiple Choice")]
    MultipleChoice,
    #[serde(rename = "Short Answer")]
    ShortAnswer,
    #[serde(rename = "Essay")]
    Essay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    /// Front of the card
    pub term: String,
    /// Back of the card
    pub definition: String,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub label: String,
    #[serde(default)]
    pub children: Vec<MindMapNode>,
}

impl MindMapNode {
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MindMapNode::node_count).sum::<usize>()
    }

    /// A node needs a non-blank string label; children that don't have one
    /// are skipped along with their subtrees.
    fn from_value(value: &Value, depth: usize) -> Option<Self> {
        let label = ["label", "name", "topic"]
            .iter()
            .find_map(|key| non_empty_str(value, key))?;
        let children = match value.get("children").and_then(Value::as_array) {
            Some(items) if depth + 1 < MIND_MAP_MAX_DEPTH => items
                .iter()
                .filter_map(|c| MindMapNode::from_value(c, depth + 1))
                .collect(),
            _ => Vec::new(),
        };
        Some(MindMapNode { label, children })
    }
}

/// Which derived view to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Practice,
    Glossary,
    Flashcards,
    MindMap,
}

impl ViewKind {
    pub fn from_mode(mode: Mode) -> Option<Self> {
        match mode {
            Mode::Qa => None,
            Mode::Practice => Some(ViewKind::Practice),
            Mode::Glossary => Some(ViewKind::Glossary),
            Mode::Flashcards => Some(ViewKind::Flashcards),
            Mode::MindMap => Some(ViewKind::MindMap),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            ViewKind::Practice => Mode::Practice,
            ViewKind::Glossary => Mode::Glossary,
            ViewKind::Flashcards => Mode::Flashcards,
            ViewKind::MindMap => Mode::MindMap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "items", rename_all = "lowercase")]
pub enum DerivedView {
    Practice(Vec<PracticeQuestion>),
    Glossary(Vec<GlossaryTerm>),
    Flashcards(Vec<Flashcard>),
    #[serde(rename = "mindmap")]
    MindMap(MindMapNode),
}

impl DerivedView {
    pub fn mode(&self) -> Mode {
        match self {
            DerivedView::Practice(_) => Mode::Practice,
            DerivedView::Glossary(_) => Mode::Glossary,
            DerivedView::Flashcards(_) => Mode::Flashcards,
            DerivedView::MindMap(_) => Mode::MindMap,
        }
    }
}

fn instructions(kind: ViewKind) -> String {
    match kind {
        ViewKind::Practice => format!(
            "Write {} practice questions that test understanding of the textbook content. \
Mix the types \"Multiple Choice\", \"Short Answer\" and \"Essay\". \
Reply with a JSON array of objects with the fields \"type\", \"question\", \
\"options\" (four strings, only for Multiple Choice) and \"answer\".",
            PRACTICE_QUESTION_COUNT
        ),
        ViewKind::Glossary => format!(
            "List up to {} key terms defined or used in the textbook content, in the order they appear. \
Reply with a JSON array of objects with the fields \"term\", \"definition\" \
and \"pageNumber\" (the page where the term is explained).",
            GLOSSARY_TERM_LIMIT
        ),
        ViewKind::Flashcards => format!(
            "Create {} flashcards for revising the textbook content. \
Reply with a JSON array of objects with the fields \"term\" (front of the card), \
\"definition\" (back of the card) and \"pageNumber\".",
            FLASHCARD_COUNT
        ),
        ViewKind::MindMap => format!(
            "Build a mind map of the textbook content, at most {} levels deep. \
Reply with a JSON object {{\"label\": <main topic>, \"children\": [ ... ]}} \
where every child has the same shape.",
            MIND_MAP_MAX_DEPTH
        ),
    }
}

/// Practice questions and flashcards lean towards what the student has asked about
fn uses_conversation(kind: ViewKind) -> bool {
    matches!(kind, ViewKind::Practice | ViewKind::Flashcards)
}

pub fn build_request(
    kind: ViewKind,
    model: &str,
    context: &str,
    history: &[ChatMessage],
) -> ChatRequest {
    let mut prompt = format!("Textbook content:\n{}\n\n", context);

    if uses_conversation(kind) {
        let asked: Vec<&str> = history
            .iter()
            .filter(|m| m.role == Role::User && !m.is_error)
            .map(|m| m.content.as_str())
            .collect();
        if !asked.is_empty() {
            prompt.push_str("The student has asked about:\n");
            for question in asked {
                prompt.push_str(&format!("- {}\n", question));
            }
            prompt.push_str("Give these topics extra weight.\n\n");
        }
    }
    prompt.push_str(&instructions(kind));

    ChatRequest {
        messages: vec![
            llm::ChatMessage::system(
                "You create study material for a student strictly from their textbook. \
Use only the textbook content you are given.",
            ),
            llm::ChatMessage::user(prompt),
        ],
        model: model.to_string(),
        json: true,
    }
}

async fn request_json<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    kind: ViewKind,
    context: &str,
    history: &[ChatMessage],
) -> Result<Value, QueryError> {
    let request = build_request(kind, model, context, history);
    let response = backend.chat(&request).await?;
    parse_json(&response.content)
}

/// Generate whichever view `kind` names
pub async fn generate<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    kind: ViewKind,
    context: &str,
    history: &[ChatMessage],
    page_count: u32,
) -> Result<DerivedView, QueryError> {
    let view = match kind {
        ViewKind::Practice => DerivedView::Practice(
            generate_practice_questions(backend, model, context, history).await?,
        ),
        ViewKind::Glossary => {
            DerivedView::Glossary(generate_glossary(backend, model, context, page_count).await?)
        }
        ViewKind::Flashcards => DerivedView::Flashcards(
            generate_flashcards(backend, model, context, history, page_count).await?,
        ),
        ViewKind::MindMap => DerivedView::MindMap(generate_mind_map(backend, model, context).await?),
    };
    log::info!("Generated {} view", view.mode());
    Ok(view)
}

pub async fn generate_practice_questions<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    context: &str,
    history: &[ChatMessage],
) -> Result<Vec<PracticeQuestion>, QueryError> {
    let value = request_json(backend, model, ViewKind::Practice, context, history).await?;
    parse_practice(&value)
}

pub async fn generate_glossary<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    context: &str,
    page_count: u32,
) -> Result<Vec<GlossaryTerm>, QueryError> {
    let value = request_json(backend, model, ViewKind::Glossary, context, &[]).await?;
    parse_glossary(&value, page_count)
}

pub async fn generate_flashcards<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    context: &str,
    history: &[ChatMessage],
    page_count: u32,
) -> Result<Vec<Flashcard>, QueryError> {
    let value = request_json(backend, model, ViewKind::Flashcards, context, history).await?;
    parse_flashcards(&value, page_count)
}

pub async fn generate_mind_map<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    context: &str,
) -> Result<MindMapNode, QueryError> {
    let value = request_json(backend, model, ViewKind::MindMap, context, &[]).await?;
    parse_mind_map(value)
}

/// Parse a view reply. Items missing required fields are skipped.
pub fn parse_view(kind: ViewKind, raw: &str, page_count: u32) -> Result<DerivedView, QueryError> {
    let value = parse_json(raw)?;
    Ok(match kind {
        ViewKind::Practice => DerivedView::Practice(parse_practice(&value)?),
        ViewKind::Glossary => DerivedView::Glossary(parse_glossary(&value, page_count)?),
        ViewKind::Flashcards => DerivedView::Flashcards(parse_flashcards(&value, page_count)?),
        ViewKind::MindMap => DerivedView::MindMap(parse_mind_map(value)?),
    })
}

/// The model sometimes wraps the array in an object like `{"questions": [...]}`
fn item_array<'a>(value: &'a Value, key: &str) -> Result<&'a [Value], QueryError> {
    let array = match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_array)
            .or_else(|| map.values().find_map(Value::as_array)),
        _ => None,
    };
    array
        .map(Vec::as_slice)
        .ok_or_else(|| QueryError::Malformed(format!("expected a JSON array of {}", key)))
}

fn non_empty_str(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_practice(value: &Value) -> Result<Vec<PracticeQuestion>, QueryError> {
    let items = item_array(value, "questions")?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let kind: QuestionKind = serde_json::from_value(item.get("type")?.clone()).ok()?;
            let question = non_empty_str(item, "question")?;
            let answer = non_empty_str(item, "answer")?;
            let options = item
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect::<Vec<_>>()
                })
                .filter(|opts| kind == QuestionKind::MultipleChoice && !opts.is_empty());
            Some(PracticeQuestion {
                kind,
                question,
                options,
                answer,
            })
        })
        .collect())
}

fn parse_cards(
    value: &Value,
    key: &str,
    page_count: u32,
) -> Result<Vec<(String, String, Option<u32>)>, QueryError> {
    let items = item_array(value, key)?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let term = non_empty_str(item, "term")?;
            let definition = non_empty_str(item, "definition")?;
            let page = item
                .get("pageNumber")
                .and_then(|v| page_in_range(v, page_count));
            Some((term, definition, page))
        })
        .collect())
}

fn parse_glossary(value: &Value, page_count: u32) -> Result<Vec<GlossaryTerm>, QueryError> {
    Ok(parse_cards(value, "terms", page_count)?
        .into_iter()
        .map(|(term, definition, page_number)| GlossaryTerm {
            term,
            definition,
            page_number,
        })
        .collect())
}

fn parse_flashcards(value: &Value, page_count: u32) -> Result<Vec<Flashcard>, QueryError> {
    Ok(parse_cards(value, "flashcards", page_count)?
        .into_iter()
        .map(|(term, definition, page_number)| Flashcard {
            term,
            definition,
            page_number,
        })
        .collect())
}

fn parse_mind_map(value: Value) -> Result<MindMapNode, QueryError> {
    let value = match value {
        Value::Object(mut map) if !map.contains_key("label") && map.contains_key("root") => {
            map.remove("root").unwrap_or(Value::Null)
        }
        other => other,
    };
    MindMapNode::from_value(&value, 0)
        .ok_or_else(|| QueryError::Malformed("mind map has no root label".into()))
}
