use super::{read_json, ChatRequest, ChatResponse, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

fn text_content(role: Option<&str>, text: &str) -> GeminiContent {
    GeminiContent {
        role: role.map(String::from),
        parts: vec![GeminiPart {
            text: text.to_string(),
        }],
    }
}

fn build_request(request: &ChatRequest) -> GeminiRequest {
    let system_instruction = request
        .messages
        .iter()
        .find(|m| m.role == "system")
        .map(|m| text_content(None, &m.content));

    // Gemini calls the assistant side "model"
    let contents = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { m.role.as_str() };
            text_content(Some(role), &m.content)
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: request.json.then_some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

pub async fn chat(config: &GeminiConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    let client = Client::new();
    let body = build_request(request);

    let resp = client
        .post(format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url, request.model
        ))
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &config.api_key)
        .json(&body)
        .send()
        .await?;

    let data: GeminiResponse = read_json(resp).await?;
    let content = data
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .ok_or_else(|| LlmError::Parse("Gemini returned no candidates".into()))?;

    Ok(ChatResponse {
        content,
        model: request.model.clone(),
    })
}
