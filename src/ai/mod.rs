//! Client for the external completion and transcription endpoint.

pub mod parse;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::AppError;
use crate::generation::AudioUpload;
use crate::models::Language;

/// The model endpoint as the generation requestors see it.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends one system + user message pair and returns the reply text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AppError>;

    /// Speech to text. An empty string means nothing was recognised.
    async fn transcribe(&self, audio: &AudioUpload, language: Language) -> Result<String, AppError>;
}

/// OpenAI-compatible HTTP backend.
pub struct OpenAiClient {
    client: Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 300;

impl OpenAiClient {
    pub fn new(mut config: AiConfig) -> Result<Self, AppError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Generation("AI API key not configured".to_string()))
    }
}

// Non-2xx answers become a generation error carrying a trimmed copy of the body
async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(AppError::Generation(format!(
        "AI endpoint returned {}: {}",
        status.as_u16(),
        body
    )))
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(model = %self.config.chat_model, prompt_len = prompt.len(), "requesting completion");
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = ensure_success(response).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Generation("empty completion".to_string()))
    }

    async fn transcribe(&self, audio: &AudioUpload, language: Language) -> Result<String, AppError> {
        let file = Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name())
            .mime_str(&audio.mime_type)?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.config.transcription_model.clone())
            .text("language", language.code());

        tracing::debug!(bytes = audio.bytes.len(), mime = %audio.mime_type, "requesting transcription");
        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await?;
        let response: TranscriptionResponse = ensure_success(response).await?.json().await?;
        Ok(response.text)
    }
}
