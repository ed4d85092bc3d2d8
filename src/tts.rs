//! Spanish speech synthesis for voice turns.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::error::Error;
use std::time::Duration;

const TTS_URL: &str = "https://translate.google.com/translate_tts";
const REQUEST_TIMEOUT_SECS: u64 = 30;

static MARKDOWN_DECOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_#]").unwrap());
static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());

/// Strip markdown decoration so it is not read aloud: emphasis characters
/// disappear, links collapse to their label.
pub fn clean_text_for_speech(text: &str) -> String {
    let without_links = MARKDOWN_LINK.replace_all(text, "$1");
    MARKDOWN_DECOR.replace_all(&without_links, "").into_owned()
}

#[derive(Debug)]
pub struct TtsClient {
    client: Client,
    base_url: String,
}

impl Default for TtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: TTS_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch MP3 audio for a reply. Replies too short to speak yield no
    /// audio.
    pub async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, Box<dyn Error + Send + Sync>> {
        let clean = clean_text_for_speech(text);
        if clean.trim().len() < 2 {
            return Ok(None);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", "es"),
                ("q", clean.trim()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("TTS error ({})", response.status()).into());
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }
}
