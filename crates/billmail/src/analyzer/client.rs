//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::processor::PreparedImage;

use super::prompts;
use super::retry::RetryPolicy;
use super::{AnalyzerError, BillingFields, Classification, DocumentAnalyzer};

/// Longest error body kept in an [`AnalyzerError`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: String,
}

/// Analyzer backed by a chat completions endpoint with function calling
/// and image input.
pub struct OpenAiAnalyzer {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    retry: RetryPolicy,
}

impl OpenAiAnalyzer {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AnalyzerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzerError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn function_request(&self, prompt: &str, function: Value) -> Value {
        let name = function["name"].clone();
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompts::SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "tools": [{"type": "function", "function": function}],
            "tool_choice": {"type": "function", "function": {"name": name}},
            "max_tokens": 4096,
            "temperature": 0
        })
    }

    fn vision_request(&self, image: &PreparedImage) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompts::VISION_PROMPT},
                    {"type": "image_url", "image_url": {"url": image.data_url()}}
                ]
            }],
            "max_tokens": 4096,
            "temperature": 0
        })
    }

    async fn post(&self, payload: &Value) -> Result<ChatResponse, AnalyzerError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = truncate(response.text().await.unwrap_or_default());
            return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                AnalyzerError::RateLimited { body }
            } else {
                AnalyzerError::Http {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        response.json::<ChatResponse>().await.map_err(|e| {
            if e.is_decode() {
                AnalyzerError::InvalidResponse(e.to_string())
            } else {
                map_transport_error(e)
            }
        })
    }

    async fn call_function<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, AnalyzerError> {
        let response = self.post(payload).await?;
        parse_tool_arguments(response)
    }
}

fn parse_tool_arguments<T: DeserializeOwned>(response: ChatResponse) -> Result<T, AnalyzerError> {
    let arguments = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.tool_calls)
        .and_then(|calls| calls.into_iter().next())
        .map(|call| call.function.arguments)
        .ok_or_else(|| AnalyzerError::InvalidResponse("No tool calls in response".to_string()))?;

    serde_json::from_str(&arguments)
        .map_err(|e| AnalyzerError::InvalidResponse(format!("Bad function arguments: {}", e)))
}

fn parse_content(response: ChatResponse) -> Result<String, AnalyzerError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnalyzerError::InvalidResponse("No content in vision response".to_string()))
}

fn map_transport_error(e: reqwest::Error) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout
    } else {
        AnalyzerError::Network(e.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
        body.truncate(idx);
    }
    body
}

#[async_trait]
impl DocumentAnalyzer for OpenAiAnalyzer {
    async fn classify(&self, text: &str) -> Result<Classification, AnalyzerError> {
        let payload = self.function_request(
            &prompts::classification_prompt(text),
            prompts::classify_function(),
        );
        self.retry
            .run("Document classification", || self.call_function(&payload))
            .await
    }

    async fn extract_fields(&self, text: &str) -> Result<BillingFields, AnalyzerError> {
        let payload =
            self.function_request(&prompts::extraction_prompt(text), prompts::extract_function());
        let fields: BillingFields = self
            .retry
            .run("Field extraction", || self.call_function(&payload))
            .await?;
        Ok(fields.with_clean_amounts())
    }

    async fn image_text(&self, image: &PreparedImage) -> Result<String, AnalyzerError> {
        let payload = self.vision_request(image);
        self.retry
            .run("Image text extraction", || async {
                parse_content(self.post(&payload).await?)
            })
            .await
    }
}
