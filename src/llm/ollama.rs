use crate::llm::client::{GenerationOptions, LLMClient};
use crate::llm::http::JsonClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct OllamaClient {
    http: JsonClient,
    model: String,
    options: GenerationOptions,
}

impl OllamaClient {
    pub fn new(
        base_url: String,
        model: String,
        options: GenerationOptions,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, None, timeout)?,
            model,
            options,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ModelOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ModelOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: ModelOptions {
                temperature: self.options.temperature,
                num_predict: self.options.max_tokens,
            },
        };

        let response: ChatResponse = self
            .http
            .post("api/chat", &request)
            .await
            .map_err(|e| AppError::Generation(format!("Ollama error: {}", e)))?;

        debug!(model = %self.model, "Ollama completion");
        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
