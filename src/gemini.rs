//! Gemini API client for the AI chat mode.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Keeps replies inside Telegram's 4096-character message limit.
const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant inside a Telegram bot. Answer concisely and \
     keep the whole reply under 3500 characters so it fits in one message.";

pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self { api_key, client }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Generate a text reply for a user prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String, String> {
        info!("🤖 Forwarding prompt to Gemini ({} chars)", prompt.len());

        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part { text: SYSTEM_INSTRUCTION.to_string() }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt.to_string() }],
            }],
        };

        let url = format!("{}?key={}", GEMINI_API_URL, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(format!("API error {status}: {body}"));
        }

        extract_text(&body)
    }
}

/// Pull the first candidate's text parts out of a generateContent response.
fn extract_text(body: &str) -> Result<String, String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    if let Some(error) = parsed.error {
        return Err(format!("Gemini error: {}", error.message));
    }

    let candidates = parsed.candidates.ok_or("No candidates in response")?;
    let candidate = candidates.first().ok_or("Empty candidates array")?;
    let content = candidate.content.as_ref().ok_or("No content in candidate")?;

    let text: String = content
        .parts
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("No text in response".to_string());
    }
    Ok(text)
}
