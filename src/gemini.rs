use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Fixed model identifier. Discovery of newer models is deliberately not
/// attempted here.
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-flash";

/// One part of the request payload: plain text or an inline binary blob
/// (image or audio) encoded as base64.
#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Clone)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: GEMINI_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint (tests use a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Post one `generateContent` request and return the reply text.
    /// The reply is treated as an opaque blob; directive extraction happens
    /// downstream.
    pub async fn generate(&self, parts: Vec<Part>) -> Result<String, Box<dyn Error + Send + Sync>> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            let mut message = format!("Error {}: {}", status.as_u16(), error_text);
            if error_text.contains("quota") {
                message.push_str("\n(Puede ser un problema temporal de cuota de API.)");
            }
            return Err(message.into());
        }

        let completion: GenerateResponse = response.json().await?;
        completion
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
            .ok_or_else(|| "No text response from Gemini".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_part_is_base64() {
        let part = Part::inline("image/png", b"abc");
        match part {
            Part::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, "YWJj");
            }
            _ => panic!("expected inline data"),
        }
    }

    #[test]
    fn parts_serialize_untagged() {
        let parts = vec![Part::text("hola"), Part::inline("audio/wav", b"x")];
        let json = serde_json::to_string(&parts).unwrap();
        assert!(json.contains(r#""text":"hola""#));
        assert!(json.contains(r#""inline_data""#));
        assert!(json.contains(r#""mime_type":"audio/wav""#));
    }
}
