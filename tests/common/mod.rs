#![allow(dead_code)]

use async_trait::async_trait;
use preppal_lib::llm::{ChatRequest, ChatResponse, LlmBackend, LlmError};
use std::sync::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers from the context it is sent, the way a well-behaved model would:
/// a question naming "page N" is answered with the text of that page.
#[derive(Default)]
pub struct EchoBackend {
    requests: Mutex<Vec<ChatRequest>>,
}

impl EchoBackend {
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> String {
        self.requests()
            .last()
            .and_then(|r| r.messages.last())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

fn page_text(prompt: &str, page: u32) -> Option<String> {
    let marker = format!("Page {}:\n", page);
    let start = prompt.find(&marker)? + marker.len();
    let rest = &prompt[start..];
    let end = rest.find("\n\n").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

fn asked_page(question: &str) -> Option<u32> {
    let after = question.split("page ").nth(1)?;
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn reply_to(prompt: &str) -> String {
    if let Some(question) = prompt.rsplit("Question: ").next().filter(|_| prompt.contains("Question: ")) {
        return match asked_page(question).and_then(|p| page_text(prompt, p).map(|t| (p, t))) {
            Some((page, text)) => serde_json::json!({
                "answer": format!("Page {} says: {}", page, text),
                "source": text,
                "pageNumber": page,
            }),
            None => serde_json::json!({
                "answer": "The textbook does not cover that.",
                "source": "",
                "pageNumber": null,
            }),
        }
        .to_string();
    }

    let first_page = page_text(prompt, 1).unwrap_or_default();
    if prompt.contains("practice questions") {
        serde_json::json!([
            {
                "type": "Multiple Choice",
                "question": "Which word opens the text?",
                "options": [first_page, "Delta", "Echo", "Foxtrot"],
                "answer": first_page,
            },
            { "type": "Essay", "question": "Summarise the document.", "answer": "It lists words." }
        ])
        .to_string()
    } else if prompt.contains("key terms") {
        serde_json::json!({ "terms": [
            { "term": first_page, "definition": "The first word", "pageNumber": 1 },
            { "term": "Zulu", "definition": "Not in the text", "pageNumber": 99 }
        ]})
        .to_string()
    } else if prompt.contains("flashcards") {
        format!(
            "```json\n{}\n```",
            serde_json::json!([{ "term": first_page, "definition": "Opening word", "pageNumber": 1 }])
        )
    } else {
        serde_json::json!({
            "label": "Document",
            "children": [{ "label": first_page, "children": [] }]
        })
        .to_string()
    }
}

#[async_trait]
impl LlmBackend for EchoBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(ChatResponse {
            content: reply_to(prompt),
            model: request.model.clone(),
        })
    }
}

/// Fails every request, like a provider that is down
pub struct FailingBackend;

#[async_trait]
impl LlmBackend for FailingBackend {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        Err(LlmError::Api {
            status: 503,
            message: "service unavailable".into(),
        })
    }
}

/// Replies with prose instead of JSON
pub struct ProseBackend;

#[async_trait]
impl LlmBackend for ProseBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: "Sure! Here is what I found in your book.".into(),
            model: request.model.clone(),
        })
    }
}

/// Build a PDF with one line of Helvetica text per page
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let font_id = 3 + 2 * pages.len();
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
/Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            font_id,
            4 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}
