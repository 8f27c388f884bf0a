use crate::llm::{self, ChatRequest, LlmBackend, LlmError};
use crate::session::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are a study assistant helping a student understand their textbook. \
Answer the question using only the textbook content you are given. \
If the content does not contain the answer, say that the textbook does not cover it. \
Reply with a JSON object with exactly these fields: \
\"answer\": your answer as plain text; \
\"source\": the exact sentence or short passage from the textbook that supports the answer, or an empty string; \
\"pageNumber\": the page number that passage comes from, or null.";

/// Parsed result of one question, before it becomes a conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnswer {
    pub answer: String,
    pub source: Option<String>,
    pub page_number: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Malformed model output: {0}")]
    Malformed(String),
}

impl Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Render prior turns so the model can resolve follow-up questions.
/// Error turns are left out; they carry no information about the document.
pub(crate) fn transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .filter(|m| !m.is_error)
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Student",
                Role::Model => "Assistant",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_request(
    model: &str,
    question: &str,
    context: &str,
    history: &[ChatMessage],
) -> ChatRequest {
    let mut prompt = format!("Textbook content:\n{}\n\n", context);
    let previous = transcript(history);
    if !previous.is_empty() {
        prompt.push_str(&format!("Conversation so far:\n{}\n\n", previous));
    }
    prompt.push_str(&format!("Question: {}", question));

    ChatRequest {
        messages: vec![
            llm::ChatMessage::system(SYSTEM_PROMPT),
            llm::ChatMessage::user(prompt),
        ],
        model: model.to_string(),
        json: true,
    }
}

/// Ask one question. A single attempt; the caller decides how to surface failure.
pub async fn ask<B: LlmBackend + ?Sized>(
    backend: &B,
    model: &str,
    question: &str,
    context: &str,
    history: &[ChatMessage],
    page_count: u32,
) -> Result<ModelAnswer, QueryError> {
    let request = build_request(model, question, context, history);
    let response = backend.chat(&request).await?;
    parse_answer(&response.content, page_count)
}

/// Parse the model's reply.
///
/// Only output that is not a JSON object at all is an error. A missing or
/// blank excerpt means "no citation"; a page number that is missing or
/// outside `1..=page_count` is dropped; an empty answer keeps no citation.
pub fn parse_answer(raw: &str, page_count: u32) -> Result<ModelAnswer, QueryError> {
    let value = parse_json(raw)?;
    let obj = value
        .as_object()
        .ok_or_else(|| QueryError::Malformed("expected a JSON object".into()))?;

    let answer = obj
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let source = obj
        .get("source")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !answer.is_empty())
        .map(String::from);

    let page_number = match source {
        Some(_) => obj.get("pageNumber").and_then(|v| page_in_range(v, page_count)),
        None => None,
    };

    Ok(ModelAnswer {
        answer,
        source,
        page_number,
    })
}

/// Strip a markdown code fence if the model wrapped its JSON in one
pub(crate) fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    if text.starts_with("```") {
        text.lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    }
}

pub(crate) fn parse_json(raw: &str) -> Result<Value, QueryError> {
    serde_json::from_str(&strip_code_fences(raw)).map_err(|e| {
        log::debug!("Unparseable model output: {}", raw);
        QueryError::Malformed(e.to_string())
    })
}

/// Accept 2, 2.0 or "2"; anything outside the document is no page at all
pub(crate) fn page_in_range(value: &Value, page_count: u32) -> Option<u32> {
    let page = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (page >= 1 && page <= page_count as u64).then_some(page as u32)
}
